//! File I/O roundtrips: containers, disguises, output naming and key files.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use cloak_file::{
    Body, CURRENT_VERSION, CloakError, Container, CryptOptions, KEY_LEN, Limits, Secret,
    SourceFile, authenticate, build_container, decrypt_file, encrypt, encrypt_block,
    encrypt_file, generate_iv, load_key_file, pack_body, save_key_file,
};
use tempfile::tempdir;

const KIB: usize = 1024;

#[inline]
fn kib(n: usize) -> usize {
    n.saturating_mul(KIB)
}

fn write_blob(path: &Path, len: usize) {
    let mut data = vec![0u8; len];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i as u32).wrapping_mul(1664525).wrapping_add(1013904223) as u8;
    }
    fs::File::create(path).unwrap().write_all(&data).unwrap();
}

fn slurp(path: &Path) -> Vec<u8> {
    let mut v = Vec::new();
    fs::File::open(path).unwrap().read_to_end(&mut v).unwrap();
    v
}

#[test]
fn encrypt_decrypt_files_roundtrip() {
    let dir = tempdir().unwrap();
    let in_path = dir.path().join("in.bin");
    let enc_path = dir.path().join("out.cloak");
    let back_path = dir.path().join("back.bin");
    write_blob(&in_path, kib(64) + 5);

    let pw = Secret::password("file password");
    let opts = CryptOptions::default();

    let written = encrypt_file(&in_path, &pw, None, Some(&enc_path), &opts).unwrap();
    assert_eq!(written, enc_path);
    let restored = decrypt_file(&enc_path, &pw, Some(&back_path), &opts).unwrap();
    assert_eq!(restored, back_path);
    assert_eq!(slurp(&in_path), slurp(&back_path));
}

#[test]
fn default_output_names() {
    let dir = tempdir().unwrap();
    let in_path = dir.path().join("report.pdf");
    write_blob(&in_path, 300);
    let original = slurp(&in_path);
    let key = Secret::raw_key(vec![9u8; KEY_LEN]);
    let opts = CryptOptions::default();

    let enc = encrypt_file(&in_path, &key, None, None, &opts).unwrap();
    assert_eq!(enc, dir.path().join("report.cloak"));

    // the original still exists, so restoring next to it needs force
    let res = decrypt_file(&enc, &key, None, &opts);
    assert!(matches!(res, Err(CloakError::Validation(_))));

    fs::remove_file(&in_path).unwrap();
    let back = decrypt_file(&enc, &key, None, &opts).unwrap();
    assert_eq!(back, dir.path().join("report.pdf"));
    assert_eq!(slurp(&back), original);
}

#[test]
fn disguised_file_takes_the_disguise_name() {
    let dir = tempdir().unwrap();
    let secret_path = dir.path().join("diary.txt");
    let cover_dir = dir.path().join("covers");
    fs::create_dir_all(&cover_dir).unwrap();
    let cover_path = cover_dir.join("cat.jpg");
    fs::write(&secret_path, b"dear diary").unwrap();
    fs::write(&cover_path, b"\xFF\xD8\xFF\xE0JFIF").unwrap();

    let pw = Secret::password("file password");
    let out_dir = dir.path().join("out");
    let out = out_dir.join("cat.jpg");
    let opts = CryptOptions::default();

    let enc = encrypt_file(&secret_path, &pw, Some(&cover_path), Some(&out), &opts).unwrap();
    let bytes = slurp(&enc);
    assert!(bytes.starts_with(b"\xFF\xD8\xFF\xE0JFIF"));

    // without an explicit output the plaintext lands next to the container
    let back = decrypt_file(&enc, &pw, None, &opts).unwrap();
    assert_eq!(back, out_dir.join("diary.txt"));
    assert_eq!(slurp(&back), b"dear diary");
}

/// Seal `body` by hand, the way a foreign writer could, behind a small disguise.
fn hand_sealed(body: &Body<'_>, raw: &[u8]) -> Vec<u8> {
    let iv = generate_iv().unwrap();
    let ciphertext = encrypt_block(&pack_body(body).unwrap(), &raw[..32], &iv).unwrap();
    let tag = authenticate(&ciphertext, &iv, &raw[32..]).unwrap();
    build_container(&Container {
        disguise: b"\xFF\xD8\xFF\xE0JFIF",
        ciphertext: &ciphertext,
        iv,
        tag,
        salt: None,
        version: CURRENT_VERSION,
    })
    .unwrap()
}

#[test]
fn embedded_name_cannot_leave_the_container_dir() {
    let dir = tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    fs::create_dir_all(&inbox).unwrap();
    let raw = vec![0x42u8; KEY_LEN];
    let key = Secret::raw_key(raw.clone());
    let opts = CryptOptions::default();

    for (name, expected) in [("../escaped", "escaped.txt"), ("/tmp/abs", "abs.txt")] {
        let container = inbox.join("cat.jpg");
        let bytes = hand_sealed(
            &Body {
                name: Some(name),
                extension: Some("txt"),
                data: b"payload",
            },
            &raw,
        );
        fs::write(&container, bytes).unwrap();

        let out = decrypt_file(&container, &key, None, &opts).unwrap();
        assert_eq!(out, inbox.join(expected));
        assert_eq!(
            fs::canonicalize(out.parent().unwrap()).unwrap(),
            fs::canonicalize(&inbox).unwrap()
        );
        assert_eq!(slurp(&out), b"payload");
    }
    assert!(!dir.path().join("escaped.txt").exists());

    // nothing usable left after stripping the path
    let container = inbox.join("dots.jpg");
    let bytes = hand_sealed(
        &Body {
            name: Some(".."),
            extension: None,
            data: b"payload",
        },
        &raw,
    );
    fs::write(&container, bytes).unwrap();
    assert!(matches!(
        decrypt_file(&container, &key, None, &opts),
        Err(CloakError::Validation(_))
    ));
}

#[test]
fn encrypt_refuses_names_with_paths() {
    let key = Secret::raw_key(vec![0x42u8; KEY_LEN]);
    let file = SourceFile {
        name: "../escaped.txt",
        data: b"payload",
    };
    assert!(matches!(
        encrypt(&file, &key, None, &CryptOptions::default()),
        Err(CloakError::Validation(_))
    ));
}

#[test]
fn existing_output_is_refused_without_force() {
    let dir = tempdir().unwrap();
    let in_path = dir.path().join("a.txt");
    let out = dir.path().join("a.cloak");
    fs::write(&in_path, b"first").unwrap();
    fs::write(&out, b"occupied").unwrap();

    let key = Secret::raw_key(vec![1u8; KEY_LEN]);
    let res = encrypt_file(&in_path, &key, None, None, &CryptOptions::default());
    assert!(matches!(res, Err(CloakError::Validation(_))));
    assert_eq!(slurp(&out), b"occupied");

    let forced = CryptOptions::default().with_force(true);
    encrypt_file(&in_path, &key, None, None, &forced).unwrap();
    assert_ne!(slurp(&out), b"occupied");
}

#[test]
fn oversized_input_is_refused() {
    let dir = tempdir().unwrap();
    let in_path = dir.path().join("big.bin");
    write_blob(&in_path, kib(2));
    let opts = CryptOptions::default().with_limits(Limits {
        max_total_size: kib(1),
        ..Limits::default()
    });
    let res = encrypt_file(
        &in_path,
        &Secret::raw_key(vec![1u8; KEY_LEN]),
        None,
        None,
        &opts,
    );
    assert!(matches!(res, Err(CloakError::Validation("file is too large"))));
}

#[test]
fn missing_input_is_io_error() {
    let dir = tempdir().unwrap();
    let res = encrypt_file(
        &dir.path().join("nope.txt"),
        &Secret::password("file password"),
        None,
        None,
        &CryptOptions::default(),
    );
    assert!(matches!(res, Err(CloakError::Io(_))));
}

#[test]
fn key_file_roundtrip() {
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("keys/backup.key");
    let key = Secret::generate_raw_key().unwrap();
    save_key_file(&key_path, &key).unwrap();
    assert_eq!(fs::metadata(&key_path).unwrap().len(), KEY_LEN as u64);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&key_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    // refuses to clobber an existing key
    assert!(save_key_file(&key_path, &key).is_err());

    let in_path = dir.path().join("a.txt");
    fs::write(&in_path, b"keyed").unwrap();
    let opts = CryptOptions::default();
    let enc = encrypt_file(&in_path, &key, None, None, &opts).unwrap();
    let loaded = load_key_file(&key_path).unwrap();
    let back = decrypt_file(&enc, &loaded, Some(&dir.path().join("b.txt")), &opts).unwrap();
    assert_eq!(slurp(&back), b"keyed");
}

#[test]
fn key_file_rules() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        save_key_file(&dir.path().join("pw.key"), &Secret::password("a password")),
        Err(CloakError::Validation(_))
    ));

    let short = dir.path().join("short.key");
    fs::write(&short, [0u8; 10]).unwrap();
    assert!(matches!(load_key_file(&short), Err(CloakError::Validation(_))));

    let long = dir.path().join("long.key");
    fs::write(&long, [0u8; KEY_LEN + 1]).unwrap();
    assert!(load_key_file(&long).is_err());
}
