//! Environment-driven configuration
//!
//! Run with: cargo test --test config_test
//!
//! The statics are read once per process, so this binary holds a single test
//! that sets the environment before touching them.

use serial_test::serial;

use filestore_bot::core::config;

#[test]
#[serial]
fn test_environment_overrides() {
    std::env::set_var("OWNER_ID", " 4242 ");
    std::env::remove_var("OWNER_URL");
    std::env::set_var("ADMIN_IDS", "1, 2\n3 x");
    std::env::set_var("HOME", "/tmp/filestore-home");
    std::env::set_var("DATA_DIR", "~/filestore-data");

    assert_eq!(*config::owner::OWNER_ID, 4242);
    assert_eq!(config::owner::OWNER_URL.as_str(), "tg://user?id=4242");
    assert_eq!(config::admin::ADMIN_IDS.as_slice(), &[1, 2, 3]);
    assert_eq!(
        config::DATA_DIR.as_path(),
        std::path::Path::new("/tmp/filestore-home/filestore-data")
    );
}
