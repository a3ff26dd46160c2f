mod common;
mod listing;
mod reconcile;
