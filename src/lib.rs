//! Brokerdesk - client and admin portal backend for an AI brokerage
//!
//! Team invitations and permission gating, bookings, support tickets,
//! Stripe payments, transactional email and a realtime change feed, served
//! as one axum application over SQLite.

pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod handlers;
pub mod icons;
pub mod invites;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod pagination;
pub mod payments;
pub mod permissions;
pub mod rate_limit;
pub mod reminders;
pub mod util;
