// Integration tests against a live Postgres. Each test no-ops unless
// TEST_DATABASE_URL is set.
mod integration {
    pub mod common;
    mod quota_test;
    mod subscription_test;
}
