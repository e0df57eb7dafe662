//! In-memory adapters.
//!
//! Process-local storage for development and tests. Records are lost on
//! restart.

mod in_memory_customer_repository;

pub use in_memory_customer_repository::InMemoryCustomerRepository;
