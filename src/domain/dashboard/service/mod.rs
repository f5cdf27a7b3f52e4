pub mod dashboard_feed_service;
