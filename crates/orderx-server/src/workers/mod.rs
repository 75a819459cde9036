pub mod token_refresher;
