#![allow(missing_docs)]

pub(crate) mod http;
pub(crate) mod state;

pub(crate) use http::{assert_error, parse_json_body};
pub(crate) use state::{
    TEST_LOGIN_BLOCK, TEST_MAX_LOGIN_ATTEMPTS, TEST_PASSWORD, get_test_config, get_test_server,
    get_test_state, get_test_state_with_config, insert_test_user, log_in, register,
    register_and_log_in, test_peer_address,
};
