mod delivery;
mod exit;
mod links;
