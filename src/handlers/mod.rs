pub mod access;
pub mod completions;
pub mod dashboard;
pub mod goals;
pub mod health;
pub mod invites;
pub mod tasks;
pub mod theme;
pub mod workspaces;
pub mod ws;
