use sandbox_fs::node::{FileTime, SetTime};

use super::common::Fixture;

#[test]
fn truncate_exposes_zero_filled_tails() {
    let fixture = Fixture::new();

    fixture.write_all("/p", b"abc");
    fixture.fs.truncate("/p", 1).expect("shrink");

    let fh = fixture.fs.open("/p", libc::O_RDONLY).expect("open");
    assert_eq!(fixture.fs.read(fh, 5, 0).expect("read"), b"a");
    fixture.fs.release(fh).expect("release");

    fixture.fs.truncate("/p", 3).expect("grow");
    assert_eq!(fixture.read_all("/p"), b"a\0\0");
}

#[test]
fn write_at_offset_extends_size_to_the_end_of_the_write() {
    let fixture = Fixture::new();

    let fh = fixture.fs.create("/f", libc::O_RDWR).expect("create");
    fixture.fs.write(fh, b"0123456789", 0).expect("write");
    fixture.fs.write(fh, b"AB", 4).expect("overwrite inside");
    assert_eq!(fixture.fs.fgetattr(fh, "/f").expect("stat").size, 10);

    fixture.fs.write(fh, b"tail", 12).expect("write past end");
    assert_eq!(fixture.fs.fgetattr(fh, "/f").expect("stat").size, 16);
    assert_eq!(fixture.fs.read(fh, 16, 0).expect("read"), b"0123AB6789\0\0tail");
    fixture.fs.release(fh).expect("release");
}

#[test]
fn reads_past_the_end_return_nothing() {
    let fixture = Fixture::new();

    fixture.write_all("/f", b"abc");
    let fh = fixture.fs.open("/f", libc::O_RDONLY).expect("open");
    assert!(fixture.fs.read(fh, 8, 3).expect("read at eof").is_empty());
    assert!(fixture.fs.read(fh, 8, 1000).expect("read far past eof").is_empty());
    fixture.fs.release(fh).expect("release");
}

#[test]
fn open_modes_gate_reads_and_writes() {
    let fixture = Fixture::new();
    fixture.write_all("/f", b"abc");

    let fh = fixture.fs.open("/f", libc::O_RDONLY).expect("open read-only");
    assert_eq!(fixture.fs.write(fh, b"x", 0).unwrap_err().code, libc::EBADF);
    assert_eq!(fixture.fs.ftruncate(fh, "/f", 0).unwrap_err().code, libc::EBADF);
    fixture.fs.release(fh).expect("release");

    let fh = fixture.fs.open("/f", libc::O_WRONLY).expect("open write-only");
    assert_eq!(fixture.fs.read(fh, 1, 0).unwrap_err().code, libc::EBADF);
    fixture.fs.release(fh).expect("release");
}

#[test]
fn ftruncate_through_a_handle_updates_the_stat() {
    let fixture = Fixture::new();

    let fh = fixture.fs.create("/f", libc::O_RDWR).expect("create");
    fixture.fs.write(fh, b"0123456789", 0).expect("write");
    fixture.fs.ftruncate(fh, "/f", 4).expect("ftruncate");

    assert_eq!(fixture.fs.fgetattr(fh, "/f").expect("fgetattr").size, 4);
    assert_eq!(fixture.fs.getattr("/f").expect("getattr").size, 4);
    fixture.fs.release(fh).expect("release");
}

#[test]
fn utimens_honors_omit_literal_and_now() {
    let fixture = Fixture::new();
    fixture.write_all("/f", b"x");
    let before = fixture.fs.getattr("/f").expect("stat");

    fixture
        .fs
        .utimens("/f", SetTime::DontChange, SetTime::DontChange)
        .expect("omit changes nothing");
    let after = fixture.fs.getattr("/f").expect("stat");
    assert_eq!(after.atime, before.atime);
    assert_eq!(after.mtime, before.mtime);

    let fixed = FileTime { seconds: 1_000, nanos: 1 };
    fixture
        .fs
        .utimens("/f", SetTime::ClientProvided(fixed), SetTime::ServerCurrent)
        .expect("set times");
    let after = fixture.fs.getattr("/f").expect("stat");
    assert_eq!(after.atime, fixed);
    assert!(after.mtime.seconds >= before.mtime.seconds);
}

#[test]
fn truncating_twice_to_the_same_size_is_stable() {
    let fixture = Fixture::new();

    fixture.write_all("/f", b"abcdef");
    fixture.fs.truncate("/f", 4).expect("first truncate");
    let first = fixture.read_all("/f");

    fixture.fs.truncate("/f", 4).expect("second truncate");
    assert_eq!(fixture.read_all("/f"), first);
    assert_eq!(fixture.fs.getattr("/f").expect("stat").size, 4);
}
