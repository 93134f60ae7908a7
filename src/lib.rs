#![forbid(unsafe_code)]
//! # cloak_file: password-based file encryption with an optional disguise.
//!
//! `cloak_file` seals a file into a single self-describing container. The container
//! can be appended to the bytes of an unrelated file (an image, a PDF, ...), so the
//! result still opens as that file while the encrypted payload sits at the tail.
//!
//! ## Features
//! - **AES-256-CBC + HMAC-SHA512** (encrypt-then-MAC), tag verified before decryption
//! - **PBKDF2-HMAC-SHA512** password stretching with a fresh salt per file
//! - **Raw 64-byte keys** as an alternative to passwords
//! - **Polyglot disguise**: arbitrary leading bytes are carried untouched
//! - **Self-check**: every container is decrypted once more before it is returned
//! - **Original name and extension** restored on decryption
//!
//! ## Example: Encrypt and decrypt bytes
//! ```no_run
//! use cloak_file::{decrypt, encrypt, CryptOptions, Secret, SourceFile};
//!
//! let opts = CryptOptions::default();
//! let secret = Secret::password("correct horse");
//! let file = SourceFile { name: "notes.txt", data: b"Hello, world!" };
//!
//! let sealed = encrypt(&file, &secret, None, &opts).unwrap();
//! assert_eq!(sealed.file_name, "notes.cloak");
//!
//! let opened = decrypt(&sealed.data, &secret, &opts).unwrap();
//! assert_eq!(opened.data, b"Hello, world!");
//! assert_eq!(opened.file_name(&sealed.file_name), "notes.txt");
//! ```
//!
//! ## Example: Hide a file behind a picture
//! ```no_run
//! use cloak_file::{encrypt_file, CryptOptions, Secret};
//! use std::path::Path;
//!
//! let out = encrypt_file(
//!     Path::new("diary.txt"),
//!     &Secret::password("correct horse"),
//!     Some(Path::new("cat.jpg")),
//!     None,
//!     &CryptOptions::default(),
//! )
//! .unwrap();
//! println!("written to {}", out.display());
//! ```
//!
//! Safety notes
//! - The crate is not audited or reviewed! Protects data at rest. Does not defend against compromised hosts/side channels.
//! - A disguise hides the container from casual inspection only; it is not steganography.

mod body;
mod crypto;
mod engine;
mod file;
mod format;
mod kdf;
mod layout;
mod naming;
mod types;

// Re-export public API from modules
pub use body::{Body, pack_body, unpack_body};
pub use crypto::{
    BLOCK_LEN, IV_LEN, SALT_LEN, TAG_LEN, authenticate, decrypt_block, encrypt_block,
    generate_iv, generate_salt, verify,
};
pub use engine::{Decrypted, Disguise, Encrypted, SourceFile, decrypt, encrypt};
pub use file::{decrypt_file, encrypt_file, load_key_file, save_key_file, write_all_atomic};
pub use format::{
    CURRENT_VERSION, Container, MAX_TRAILER_LEN, MIN_TRAILER_LEN, SUPPORTED_VERSIONS,
    build_container, parse_container, read_version,
};
pub use kdf::{KeyMaterial, PBKDF2_ITERATIONS, derive_key};
pub use layout::{Anchor, Field, Layout, Unpacked, pack, unpack};
pub use naming::{add_extension, change_extension, parse_file_name};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_small_default() {
        let pw = Secret::password("password");
        let opts = CryptOptions::default();
        let file = SourceFile {
            name: "hi.txt",
            data: b"hi",
        };
        let sealed = encrypt(&file, &pw, None, &opts).unwrap();
        let opened = decrypt(&sealed.data, &pw, &opts).unwrap();
        assert_eq!(opened.data, b"hi");
        assert_eq!(opened.extension.as_deref(), Some("txt"));
    }

    #[test]
    fn wrong_password_fails() {
        let opts = CryptOptions::default();
        let file = SourceFile {
            name: "data.bin",
            data: b"data",
        };
        let sealed = encrypt(&file, &Secret::password("password"), None, &opts).unwrap();
        let err = decrypt(&sealed.data, &Secret::password("passw0rd"), &opts).unwrap_err();
        assert!(matches!(err, CloakError::Authentication));
    }

    #[test]
    fn public_types_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Secret>();
        assert_send_sync::<CryptOptions>();
        assert_send_sync::<Encrypted>();
        assert_send_sync::<Decrypted>();
        assert_send_sync::<CloakError>();
    }
}
