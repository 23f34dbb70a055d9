// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use common::{names, p, posix_fs};
use memfs_core::{FsError, MoveOptions, OpenOptions};

#[test]
fn relative_names_resolve_against_the_stream() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/dir"), &[]).unwrap();
    fs.create_file(&p(&fs, "/dir/a"), &[]).unwrap();
    fs.create_file(&p(&fs, "/a"), &[]).unwrap();

    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();
    stream.delete_file(&p(&fs, "a")).unwrap();

    assert!(!fs.exists(&p(&fs, "/dir/a")));
    assert!(fs.exists(&p(&fs, "/a")));
}

#[test]
fn absolute_names_resolve_from_the_root() {
    let fs = posix_fs();
    fs.create_directories(&p(&fs, "/dir/sub"), &[]).unwrap();
    fs.create_directory(&p(&fs, "/sub"), &[]).unwrap();
    fs.create_file(&p(&fs, "/a"), &[]).unwrap();
    fs.create_file(&p(&fs, "/dir/a"), &[]).unwrap();

    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();
    stream.delete_file(&p(&fs, "/a")).unwrap();
    stream.delete_directory(&p(&fs, "/sub")).unwrap();

    assert!(!fs.exists(&p(&fs, "/a")));
    assert!(!fs.exists(&p(&fs, "/sub")));
    assert!(fs.exists(&p(&fs, "/dir/a")));
    assert!(fs.exists(&p(&fs, "/dir/sub")));
}

#[test]
fn delete_checks_entry_kind() {
    let fs = posix_fs();
    fs.create_directories(&p(&fs, "/dir/sub"), &[]).unwrap();
    fs.create_file(&p(&fs, "/dir/file"), &[]).unwrap();
    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();

    assert!(matches!(
        stream.delete_file(&p(&fs, "sub")),
        Err(FsError::FileIsDirectory { .. })
    ));
    assert!(matches!(
        stream.delete_directory(&p(&fs, "file")),
        Err(FsError::NotDirectory { .. })
    ));
    stream.delete_directory(&p(&fs, "sub")).unwrap();
    stream.delete_file(&p(&fs, "file")).unwrap();
}

#[test]
fn operations_follow_the_directory_after_it_is_renamed() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/dir"), &[]).unwrap();
    fs.write_all(&p(&fs, "/dir/file"), b"kept").unwrap();
    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();

    fs.move_path(&p(&fs, "/dir"), &p(&fs, "/renamed"), MoveOptions::default())
        .unwrap();
    fs.create_directory(&p(&fs, "/dir"), &[]).unwrap();
    fs.write_all(&p(&fs, "/dir/file"), b"decoy").unwrap();

    let attrs = stream.basic_attributes(&p(&fs, "file")).unwrap();
    assert_eq!(attrs.size, 4);
    stream.delete_file(&p(&fs, "file")).unwrap();

    assert!(!fs.exists(&p(&fs, "/renamed/file")));
    assert_eq!(fs.read_all(&p(&fs, "/dir/file")).unwrap(), b"decoy");
}

#[test]
fn closed_stream_rejects_operations() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/dir"), &[]).unwrap();
    fs.create_file(&p(&fs, "/dir/a"), &[]).unwrap();
    fs.create_directory(&p(&fs, "/dir/sub"), &[]).unwrap();
    fs.create_directory(&p(&fs, "/other"), &[]).unwrap();
    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();
    let open = fs.new_directory_stream(&p(&fs, "/other")).unwrap();

    stream.close();
    stream.close();
    assert!(!stream.is_open());
    assert_eq!(stream.delete_file(&p(&fs, "a")), Err(FsError::StreamClosed));
    assert_eq!(stream.delete_directory(&p(&fs, "sub")), Err(FsError::StreamClosed));
    assert!(matches!(
        stream.new_byte_channel(&p(&fs, "a"), &OpenOptions::new(), &[]),
        Err(FsError::StreamClosed)
    ));
    assert!(matches!(
        stream.new_byte_channel(&p(&fs, "fresh"), &OpenOptions::new().write(true).create(true), &[]),
        Err(FsError::StreamClosed)
    ));
    assert!(matches!(stream.entries(), Err(FsError::StreamClosed)));
    assert!(matches!(
        stream.new_directory_stream(&p(&fs, ".")),
        Err(FsError::StreamClosed)
    ));
    assert_eq!(stream.basic_attributes(&p(&fs, "a")), Err(FsError::StreamClosed));
    assert_eq!(stream.posix_attributes(&p(&fs, "a")), Err(FsError::StreamClosed));
    assert_eq!(
        stream.move_entry(&p(&fs, "a"), &open, &p(&fs, "a")),
        Err(FsError::StreamClosed)
    );
    assert_eq!(
        open.move_entry(&p(&fs, "x"), &stream, &p(&fs, "x")),
        Err(FsError::StreamClosed)
    );

    assert!(fs.exists(&p(&fs, "/dir/a")));
    assert!(fs.exists(&p(&fs, "/dir/sub")));
    assert!(!fs.exists(&p(&fs, "/dir/fresh")));
}

#[test]
fn removed_directory_leaves_a_stale_handle() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/dir"), &[]).unwrap();
    let stream = fs.new_directory_stream(&p(&fs, "/dir")).unwrap();
    fs.delete(&p(&fs, "/dir")).unwrap();

    assert_eq!(
        stream.delete_file(&p(&fs, "anything")),
        Err(FsError::ClosedOrStaleHandle)
    );
    assert_eq!(stream.entries().unwrap().count(), 0);
}

#[test]
fn move_entry_between_streams() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/src"), &[]).unwrap();
    fs.create_directory(&p(&fs, "/dst"), &[]).unwrap();
    fs.write_all(&p(&fs, "/src/f"), b"moved").unwrap();
    fs.create_file(&p(&fs, "/dst/taken"), &[]).unwrap();

    let source = fs.new_directory_stream(&p(&fs, "/src")).unwrap();
    let target = fs.new_directory_stream(&p(&fs, "/dst")).unwrap();

    source.move_entry(&p(&fs, "f"), &target, &p(&fs, "g")).unwrap();
    assert!(!fs.exists(&p(&fs, "/src/f")));
    assert_eq!(fs.read_all(&p(&fs, "/dst/g")).unwrap(), b"moved");

    fs.create_file(&p(&fs, "/src/h"), &[]).unwrap();
    assert!(matches!(
        source.move_entry(&p(&fs, "h"), &target, &p(&fs, "taken")),
        Err(FsError::FileAlreadyExists { .. })
    ));
}

#[test]
fn nested_streams_and_channels() {
    let fs = posix_fs();
    fs.create_directories(&p(&fs, "/top/inner"), &[]).unwrap();
    let top = fs.new_directory_stream(&p(&fs, "/top")).unwrap();
    let inner = top.new_directory_stream(&p(&fs, "inner")).unwrap();
    assert_eq!(inner.path().to_string(), "/top/inner");

    let options = OpenOptions::new().write(true).create_new(true);
    let mut channel = inner.new_byte_channel(&p(&fs, "data"), &options, &[]).unwrap();
    channel.write(b"abc").unwrap();
    channel.close().unwrap();

    assert_eq!(fs.read_all(&p(&fs, "/top/inner/data")).unwrap(), b"abc");
    assert!(inner.posix_attributes(&p(&fs, "data")).unwrap().basic.is_regular_file());
    assert!(matches!(
        inner.dos_attributes(&p(&fs, "data")),
        Err(FsError::UnsupportedAttribute { .. })
    ));
}

#[test]
fn listing_is_single_pass_and_filtered() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/d"), &[]).unwrap();
    for name in ["b.txt", "a.log", "c.txt"] {
        fs.create_file(&p(&fs, &format!("/d/{name}")), &[]).unwrap();
    }

    let stream = fs
        .new_directory_stream_filtered(&p(&fs, "/d"), |path| path.to_string().ends_with(".txt"))
        .unwrap();
    let listed = names(stream.entries().unwrap());
    assert_eq!(listed, ["b.txt", "c.txt"]);
    assert!(matches!(stream.entries(), Err(FsError::IllegalState(_))));
}

#[test]
fn listing_is_captured_at_first_step() {
    let fs = posix_fs();
    fs.create_directory(&p(&fs, "/d"), &[]).unwrap();
    fs.create_file(&p(&fs, "/d/one"), &[]).unwrap();

    let stream = fs.new_directory_stream(&p(&fs, "/d")).unwrap();
    let mut entries = stream.entries().unwrap();
    fs.create_file(&p(&fs, "/d/two"), &[]).unwrap();
    let first = entries.next().unwrap();
    fs.create_file(&p(&fs, "/d/three"), &[]).unwrap();

    let rest: Vec<_> = entries.collect();
    assert_eq!(first.to_string(), "/d/one");
    assert_eq!(names(rest), ["two"]);
}
