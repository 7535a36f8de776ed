pub mod mock_scheduler;
pub mod mock_transport;
