mod helpers;
mod routes;
mod state;
