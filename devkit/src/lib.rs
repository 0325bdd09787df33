/*!
# zabbix-devkit - stubs and helpers for zabbix-init tests

- In-process Zabbix JSON-RPC stub (axum) with an in-memory object store
- Call recording for idempotency assertions
- Test harness producing the env map zabbix-init reads its settings from
*/

pub mod state;
pub mod test_utils;
pub mod zabbix_stub;

pub use state::RecordedCall;
pub use test_utils::TestHarness;
pub use zabbix_stub::ZabbixStub;
