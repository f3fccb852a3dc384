/*
[INPUT]:  Broker-issued access token
[OUTPUT]: Bearer credential shared by REST and streaming clients
[POS]:    Auth layer - credential handling
[UPDATE]: When credential sources or header format change
*/

pub mod token;

pub use token::SecretToken;
