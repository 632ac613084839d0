pub mod cart;
pub mod config;
pub mod customer;
pub mod db;
pub mod device;
pub mod dto;
pub mod entity;
pub mod error;
pub mod mirror;
pub mod models;
pub mod order_number;
pub mod pricing;
pub mod repository;
pub mod response;
pub mod routes;
pub mod services;
pub mod session;
pub mod shopper;
pub mod state;
pub mod storage;
pub mod tracking;
pub mod whatsapp;
