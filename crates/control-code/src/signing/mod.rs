mod control_code;
mod keys;

pub use self::control_code::{
    SIGNATURE_ALGORITHM, round_trip_self_test, self_test_with_key_file, sign, sign_with_key_file,
    verify, verify_with_certificate_file,
};
pub use keys::{PrivateKeyMaterial, PublicKeyMaterial};
