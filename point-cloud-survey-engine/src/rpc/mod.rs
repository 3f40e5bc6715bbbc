/// JSON-RPC 2.0 bridge to the embedding frontend.
pub mod web_rpc;
