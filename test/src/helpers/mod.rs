mod test_harness;

pub use test_client::TestClient;
pub use test_harness::TestHarness;
