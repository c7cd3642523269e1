pub mod chat_service;
pub mod conversation_service;
pub mod event_log;
pub mod interest_service;
pub mod match_engine;
pub mod message_service;
pub mod quota_ledger;
pub mod reaction_tracker;
pub mod receipt_dispatcher;
pub mod receipt_tracker;
pub mod typing_throttle;
