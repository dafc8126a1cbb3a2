//! Behavioural tests for the harness and host.
//!
//! | Module | Covers |
//! |--------|--------|
//! | transitions | Transition table, exhaustively and under proptest |
//! | lifecycle | Startup, loop and normal stop |
//! | shutdown | Exactly-once teardown across racing triggers |
//! | host | Registration, bring-up abort and host shutdown |

mod transitions;
