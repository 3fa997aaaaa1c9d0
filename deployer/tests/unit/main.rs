//! Integration tests for the deploy/rollback pipelines

mod fakes;
mod test_registry;
mod test_release;
