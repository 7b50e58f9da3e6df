use super::common::Fixture;

#[test]
fn mkdir_creates_a_listable_empty_directory() {
    let fixture = Fixture::new();

    fixture.fs.mkdir("/d", libc::S_IFDIR | 0o755).expect("mkdir");

    let stat = fixture.fs.getattr("/d").expect("stat");
    assert!(stat.size == 0);
    assert_eq!(stat.mode & libc::S_IFMT, libc::S_IFDIR);
    assert_eq!(fixture.names("/d"), vec![".".to_owned(), "..".to_owned()]);
}

#[test]
fn write_rename_read_round_trip() {
    let fixture = Fixture::new();

    fixture.fs.mkdir("/d", libc::S_IFDIR | 0o755).expect("mkdir");
    fixture.write_all("/d/f", b"hello");
    fixture.fs.rename("/d/f", "/d/g").expect("rename");

    assert_eq!(fixture.read_all("/d/g"), b"hello");
    assert_eq!(fixture.fs.getattr("/d/f").unwrap_err().code, libc::ENOENT);
}

#[test]
fn rename_carries_stat_and_children() {
    let fixture = Fixture::new();

    fixture.fs.mkdir("/src", libc::S_IFDIR | 0o755).expect("mkdir");
    fixture.write_all("/src/inner", b"payload");

    fixture.fs.rename("/src", "/moved").expect("rename directory");

    assert!(fixture.fs.getattr("/moved").expect("stat").mode & libc::S_IFMT == libc::S_IFDIR);
    assert_eq!(fixture.read_all("/moved/inner"), b"payload");
    assert_eq!(fixture.fs.getattr("/src").unwrap_err().code, libc::ENOENT);
}

#[test]
fn rename_into_a_missing_directory_chain_creates_it() {
    let fixture = Fixture::new();

    fixture.write_all("/f", b"x");
    fixture.fs.rename("/f", "/a/b/f").expect("rename into fresh chain");

    assert!(fixture.names("/a").contains(&"b".to_owned()));
    assert_eq!(fixture.read_all("/a/b/f"), b"x");
}

#[test]
fn unlink_and_rmdir_enforce_node_kinds() {
    let fixture = Fixture::new();

    fixture.fs.mkdir("/d", libc::S_IFDIR | 0o755).expect("mkdir");
    fixture.write_all("/d/f", b"data");

    assert_eq!(fixture.fs.unlink("/d").unwrap_err().code, libc::EISDIR);
    assert_eq!(fixture.fs.rmdir("/d").unwrap_err().code, libc::ENOTEMPTY);
    assert_eq!(fixture.fs.rmdir("/d/f").unwrap_err().code, libc::ENOTDIR);

    fixture.fs.unlink("/d/f").expect("unlink file");
    fixture.fs.rmdir("/d").expect("rmdir emptied dir");
    assert_eq!(fixture.fs.getattr("/d").unwrap_err().code, libc::ENOENT);
}

#[test]
fn readdir_reflects_mutations() {
    let fixture = Fixture::new();

    fixture.fs.mkdir("/one", libc::S_IFDIR | 0o755).expect("mkdir");
    fixture.write_all("/two", b"2");

    let names = fixture.names("/");
    assert!(names.contains(&"one".to_owned()));
    assert!(names.contains(&"two".to_owned()));

    fixture.fs.unlink("/two").expect("unlink");
    assert!(!fixture.names("/").contains(&"two".to_owned()));
}
