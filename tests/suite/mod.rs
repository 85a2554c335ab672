mod client;
mod reconcile;
mod state;
