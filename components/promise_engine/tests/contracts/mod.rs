//! Contract tests for promise_engine
