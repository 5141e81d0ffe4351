pub mod keypair;
pub mod operator;
