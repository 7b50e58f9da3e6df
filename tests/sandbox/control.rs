use super::common::{token_from, Fixture};

const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[test]
fn load_replies_with_a_token_and_blocks_a_second_load() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar("a.tar", &[("hello.txt", b"hi there")]);
    let request = format!(r#"{{"cmd":"LOAD","args":{{"file":"{}"}}}}"#, archive.display());

    let reply = fixture.control(&request).expect("LOAD succeeds").expect("LOAD replies");
    let token = token_from(&reply);
    assert_eq!(token.len(), 32);
    assert!(token.bytes().all(|byte| CHARSET.contains(&byte)));

    let err = fixture.control(&request).unwrap_err();
    assert_eq!(err.code, libc::EEXIST);
}

#[test]
fn mount_grafts_the_archive_under_the_alias() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar(
        "a.tar",
        &[("docs/readme.md", b"# hello"), ("docs/data.bin", b"\x00\x01\x02"), ("top", b"t")],
    );

    let token = fixture.load(&archive);
    fixture.mount(&token, "x");

    let names = fixture.names("/");
    assert!(names.contains(&"x".to_owned()));
    assert!(names.contains(&"_fsctl".to_owned()));
    assert!(fixture.names("/x").contains(&"docs".to_owned()));

    assert_eq!(fixture.read_all("/x/docs/readme.md"), b"# hello");
    assert_eq!(fixture.read_all("/x/docs/data.bin"), b"\x00\x01\x02");
    assert_eq!(fixture.read_all("/x/top"), b"t");
}

#[test]
fn unmount_detaches_and_unload_forgets() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar("a.tar", &[("f", b"x")]);
    let token = fixture.load(&archive);
    fixture.mount(&token, "x");

    let reply = fixture
        .control(r#"{"cmd":"UNMOUNT","args":{"alias":"x"}}"#)
        .expect("UNMOUNT succeeds");
    assert!(reply.is_none());
    assert!(!fixture.names("/").contains(&"x".to_owned()));

    let unload = format!(r#"{{"cmd":"UNLOAD","args":{{"token":"{token}"}}}}"#);
    assert!(fixture.control(&unload).expect("UNLOAD succeeds").is_none());
    assert_eq!(fixture.control(&unload).unwrap_err().code, libc::ENOENT);
}

#[test]
fn mounts_survive_unload_and_stay_isolated() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar("a.tar", &[("file", b"original")]);
    let token = fixture.load(&archive);
    fixture.mount(&token, "x");
    fixture.mount(&token, "y");

    let unload = format!(r#"{{"cmd":"UNLOAD","args":{{"token":"{token}"}}}}"#);
    fixture.control(&unload).expect("UNLOAD succeeds");

    // the grafts are clones and keep serving
    assert_eq!(fixture.read_all("/x/file"), b"original");

    // mutating one graft never leaks into the other
    fixture.write_all("/x/file", b"modified");
    assert_eq!(fixture.read_all("/x/file"), b"modified");
    assert_eq!(fixture.read_all("/y/file"), b"original");
}

#[test]
fn mount_validates_token_and_alias() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar("a.tar", &[("f", b"x")]);
    let token = fixture.load(&archive);

    let unknown = r#"{"cmd":"MOUNT","args":{"token":"nope","alias":"x"}}"#;
    assert_eq!(fixture.control(unknown).unwrap_err().code, libc::ENOENT);

    let bad_alias =
        format!(r#"{{"cmd":"MOUNT","args":{{"token":"{token}","alias":"a/b"}}}}"#);
    assert_eq!(fixture.control(&bad_alias).unwrap_err().code, libc::EINVAL);

    fixture.mount(&token, "x");
    let in_use = format!(r#"{{"cmd":"MOUNT","args":{{"token":"{token}","alias":"x"}}}}"#);
    assert_eq!(fixture.control(&in_use).unwrap_err().code, libc::EEXIST);
}

#[test]
fn unknown_commands_and_garbage_are_einval() {
    let fixture = Fixture::new();
    assert_eq!(fixture.control("this is not json").unwrap_err().code, libc::EINVAL);
    assert_eq!(
        fixture.control(r#"{"cmd":"DESTROY","args":{}}"#).unwrap_err().code,
        libc::EINVAL
    );
    assert_eq!(fixture.control(r#"{"cmd":"LOAD","args":{}}"#).unwrap_err().code, libc::EINVAL);
}

#[test]
fn failed_load_keeps_the_archive_path_reserved() {
    let fixture = Fixture::new();
    let missing = fixture.path("missing.tar");
    let request = format!(r#"{{"cmd":"LOAD","args":{{"file":"{}"}}}}"#, missing.display());

    assert_eq!(fixture.control(&request).unwrap_err().code, libc::ENOENT);
    // the first attempt reserved the path even though the import failed
    assert_eq!(fixture.control(&request).unwrap_err().code, libc::EEXIST);
}

#[test]
fn compressed_and_zip_archives_mount_too() {
    let fixture = Fixture::new();

    let targz = fixture.make_tar_gz("a.tgz", &[("deep/nested/file", b"gzip bytes")]);
    let token = fixture.load(&targz);
    fixture.mount(&token, "gz");
    assert_eq!(fixture.read_all("/gz/deep/nested/file"), b"gzip bytes");

    let zip = fixture.make_zip("b.zip", &[("folder/entry.txt", b"zip bytes")]);
    let token = fixture.load(&zip);
    fixture.mount(&token, "zip");
    assert_eq!(fixture.read_all("/zip/folder/entry.txt"), b"zip bytes");
}

#[test]
fn partial_lines_buffer_until_the_newline_arrives() {
    let fixture = Fixture::new();
    let archive = fixture.make_tar("a.tar", &[("f", b"x")]);
    let request = format!(r#"{{"cmd":"LOAD","args":{{"file":"{}"}}}}"#, archive.display());
    let (head, tail) = request.split_at(10);

    let fh = fixture.fs.open("/_fsctl", libc::O_RDWR).expect("open control");

    fixture.fs.write(fh, head.as_bytes(), 0).expect("partial write buffers");
    assert!(fixture.fs.read(fh, 256, 0).expect("no reply yet").is_empty());

    let mut rest = tail.to_owned();
    rest.push('\n');
    fixture.fs.write(fh, rest.as_bytes(), 0).expect("completed line dispatches");

    let reply = fixture.fs.read(fh, 256, 0).expect("reply queued");
    assert_eq!(token_from(String::from_utf8(reply).expect("utf-8").trim_end()).len(), 32);
    fixture.fs.release(fh).expect("release");
}

#[test]
fn replies_queue_in_dispatch_order_on_one_handle() {
    let fixture = Fixture::new();
    let first = fixture.make_tar("a.tar", &[("f", b"1")]);
    let second = fixture.make_tar("b.tar", &[("f", b"2")]);

    let fh = fixture.fs.open("/_fsctl", libc::O_RDWR).expect("open control");
    let batch = format!(
        "{{\"cmd\":\"LOAD\",\"args\":{{\"file\":\"{}\"}}}}\n{{\"cmd\":\"LOAD\",\"args\":{{\"file\":\"{}\"}}}}\n",
        first.display(),
        second.display()
    );
    fixture.fs.write(fh, batch.as_bytes(), 0).expect("both lines dispatch");

    let replies = fixture.fs.read(fh, 4096, 0).expect("read replies");
    let text = String::from_utf8(replies).expect("utf-8");
    let tokens: Vec<String> = text.lines().map(token_from).collect();
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);
    fixture.fs.release(fh).expect("release");
}
