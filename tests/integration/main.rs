//! Integration tests: full scan passes against an in-memory venue.

mod mock_exchange;
mod scan_pass;
