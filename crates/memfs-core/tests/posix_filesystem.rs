// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom, Write};

use common::{names, p, posix_fs};
use memfs_core::{
    AttributeValue, CopyOptions, FileAttribute, FileTime, FsConfig, FsError, GroupPrincipal,
    MemoryFileSystem, MoveOptions, OpenOptions, PermissionSet, UserPrincipal,
};

#[test]
fn new_file_gets_default_owner_group_and_permissions() {
    let fs = posix_fs();
    let file = p(&fs, "/file.txt");
    fs.create_file(&file, &[]).unwrap();

    let attrs = fs.read_posix_attributes(&file).unwrap();
    assert_eq!(attrs.owner, UserPrincipal::new("root"));
    assert_eq!(attrs.group, GroupPrincipal::new("root"));
    assert_eq!(attrs.permissions.to_string(), "rw-r--r--");
    assert!(attrs.basic.is_regular_file());
    assert_eq!(attrs.basic.size, 0);
}

#[test]
fn posix_views_are_basic_owner_posix() {
    let fs = posix_fs();
    let expected: BTreeSet<&str> = ["basic", "owner", "posix"].into_iter().collect();
    assert_eq!(fs.supported_file_attribute_views(), expected);
    assert!(matches!(
        fs.dos_view(&p(&fs, "/")),
        Err(FsError::UnsupportedAttribute { .. })
    ));
}

#[test]
fn root_has_an_owner() {
    let fs = posix_fs();
    let owner = fs.get_owner(&p(&fs, "/")).unwrap();
    assert_eq!(owner.name(), "root");
}

#[test]
fn copy_attributes_preserves_permissions() {
    let fs = posix_fs();
    let source = p(&fs, "/source");
    fs.write_all(&source, b"payload").unwrap();
    let private = PermissionSet::from_mode(0o600);
    fs.posix_view(&source).unwrap().set_permissions(private).unwrap();

    let with_attrs = p(&fs, "/with");
    fs.copy(
        &source,
        &with_attrs,
        CopyOptions {
            copy_attributes: true,
            ..CopyOptions::default()
        },
    )
    .unwrap();
    let without = p(&fs, "/without");
    fs.copy(&source, &without, CopyOptions::default()).unwrap();

    assert_eq!(fs.read_posix_attributes(&with_attrs).unwrap().permissions, private);
    assert_eq!(
        fs.read_posix_attributes(&without).unwrap().permissions,
        PermissionSet::from_mode(0o644)
    );
    assert_eq!(fs.read_all(&with_attrs).unwrap(), b"payload");
    assert_eq!(fs.read_all(&without).unwrap(), b"payload");
}

#[test]
fn channel_on_directory_reports_absolute_path() {
    let fs = MemoryFileSystem::new(FsConfig::posix().with_current_working_directory("/home")).unwrap();
    fs.create_directory(&p(&fs, "/home/dir"), &[]).unwrap();
    let relative = p(&fs, "dir");

    for options in [
        OpenOptions::new(),
        OpenOptions::new().read(true),
        OpenOptions::new().write(true),
    ] {
        let err = fs.new_byte_channel(&relative, &options, &[]).unwrap_err();
        assert_eq!(
            err,
            FsError::FileIsDirectory {
                path: "/home/dir".to_string()
            }
        );
    }
}

#[test]
fn times_keep_nanosecond_precision() {
    let fs = posix_fs();
    let file = p(&fs, "/t");
    fs.create_file(&file, &[]).unwrap();
    let time = FileTime::parse_rfc3339("2019-02-27T12:37:03.123456789Z").unwrap();

    fs.basic_view(&file)
        .unwrap()
        .set_times(Some(time), Some(time), Some(time))
        .unwrap();

    let attrs = fs.read_basic_attributes(&file).unwrap();
    assert_eq!(attrs.last_modified_time, time);
    assert_eq!(attrs.creation_time.to_string(), "2019-02-27T12:37:03.123456789Z");
    assert_eq!(
        fs.get_attribute(&file, "lastAccessTime").unwrap(),
        AttributeValue::Time(time)
    );
}

#[test]
fn windows_looking_name_is_a_plain_file_name() {
    let fs = posix_fs();
    let path = p(&fs, "C:\\file.txt");
    assert!(!path.is_absolute());
    assert_eq!(path.name_count(), 1);

    fs.create_file(&path, &[]).unwrap();
    let listed: Vec<_> = {
        let stream = fs.new_directory_stream(&p(&fs, "/")).unwrap();
        let entries = stream.entries().unwrap().collect::<Vec<_>>();
        names(entries)
    };
    assert_eq!(listed, ["C:\\file.txt"]);
}

#[test]
fn symlink_loop_is_detected() {
    let fs = posix_fs();
    let a = p(&fs, "/a");
    let b = p(&fs, "/b");
    fs.create_symbolic_link(&a, &b, &[]).unwrap();
    fs.create_symbolic_link(&b, &a, &[]).unwrap();

    assert!(matches!(
        fs.read_all(&a),
        Err(FsError::TooManyLevelsOfSymlinks { .. })
    ));
    assert!(!fs.exists(&a));
    assert!(fs.is_symbolic_link(&a));
    assert_eq!(fs.read_symbolic_link(&a).unwrap(), b);
}

#[test]
fn names_are_case_sensitive() {
    let fs = posix_fs();
    fs.create_file(&p(&fs, "/File"), &[]).unwrap();
    fs.create_file(&p(&fs, "/file"), &[]).unwrap();
    assert_ne!(p(&fs, "/File"), p(&fs, "/file"));
    assert!(!fs.is_same_file(&p(&fs, "/File"), &p(&fs, "/file")).unwrap());
}

#[test]
fn channel_supports_std_io_traits() {
    let fs = posix_fs();
    let file = p(&fs, "/io");
    let options = OpenOptions::new().read(true).write(true).create(true);
    let mut channel = fs.new_byte_channel(&file, &options, &[]).unwrap();

    channel.write_all(b"hello world").unwrap();
    channel.seek(SeekFrom::Start(6)).unwrap();
    let mut tail = String::new();
    channel.read_to_string(&mut tail).unwrap();
    assert_eq!(tail, "world");

    channel.truncate(5).unwrap();
    assert_eq!(channel.size().unwrap(), 5);
    channel.close().unwrap();
    assert_eq!(fs.read_all(&file).unwrap(), b"hello");
}

#[test]
fn writing_past_the_end_zero_fills() {
    let fs = posix_fs();
    let file = p(&fs, "/sparse");
    let mut channel = fs
        .new_byte_channel(&file, &OpenOptions::new().write(true).create_new(true), &[])
        .unwrap();
    channel.set_position(4).unwrap();
    channel.write(b"x").unwrap();
    channel.close().unwrap();
    assert_eq!(fs.read_all(&file).unwrap(), b"\0\0\0\0x");
}

#[test]
fn create_directories_and_move_subtree() {
    let fs = posix_fs();
    fs.create_directories(&p(&fs, "/a/b/c"), &[]).unwrap();
    fs.write_all(&p(&fs, "/a/b/c/leaf"), b"1").unwrap();

    fs.move_path(&p(&fs, "/a/b"), &p(&fs, "/moved"), MoveOptions::default())
        .unwrap();
    assert!(!fs.exists(&p(&fs, "/a/b")));
    assert_eq!(fs.read_all(&p(&fs, "/moved/c/leaf")).unwrap(), b"1");

    let err = fs
        .move_path(&p(&fs, "/moved"), &p(&fs, "/moved/c/inner"), MoveOptions::default())
        .unwrap_err();
    assert!(matches!(err, FsError::InvalidArgument(_) | FsError::AccessDenied { .. }));
}

#[test]
fn delete_non_empty_directory_fails() {
    let fs = posix_fs();
    fs.create_directories(&p(&fs, "/d/e"), &[]).unwrap();
    assert!(matches!(
        fs.delete(&p(&fs, "/d")),
        Err(FsError::DirectoryNotEmpty { .. })
    ));
    fs.delete(&p(&fs, "/d/e")).unwrap();
    fs.delete(&p(&fs, "/d")).unwrap();
    assert!(!fs.delete_if_exists(&p(&fs, "/d")).unwrap());
}

#[test]
fn hard_links_share_content() {
    let fs = posix_fs();
    let original = p(&fs, "/orig");
    let link = p(&fs, "/link");
    fs.write_all(&original, b"shared").unwrap();
    fs.create_link(&link, &original).unwrap();
    fs.delete(&original).unwrap();
    assert_eq!(fs.read_all(&link).unwrap(), b"shared");
}

#[test]
fn create_file_applies_initial_permissions() {
    let fs = posix_fs();
    let file = p(&fs, "/secret");
    let attr = FileAttribute::new(
        "posix:permissions",
        AttributeValue::Permissions(PermissionSet::from_mode(0o600)),
    );
    fs.create_file(&file, &[attr]).unwrap();
    assert_eq!(
        fs.get_attribute(&file, "posix:permissions").unwrap(),
        AttributeValue::Permissions(PermissionSet::from_mode(0o600))
    );
}

#[test]
fn file_in_the_middle_of_a_path_is_not_a_directory() {
    let fs = posix_fs();
    fs.create_file(&p(&fs, "/file"), &[]).unwrap();

    assert_eq!(
        fs.create_file(&p(&fs, "/file/x"), &[]),
        Err(FsError::NotDirectory {
            path: "/file/x".to_string()
        })
    );
    assert!(matches!(
        fs.read_all(&p(&fs, "/file/x")),
        Err(FsError::NotDirectory { .. })
    ));
}

#[test]
fn missing_intermediate_directory_is_no_such_file() {
    let fs = posix_fs();
    assert_eq!(
        fs.create_file(&p(&fs, "/missing/x"), &[]),
        Err(FsError::NoSuchFile {
            path: "/missing/x".to_string()
        })
    );
    assert!(matches!(
        fs.create_directory(&p(&fs, "/missing/x"), &[]),
        Err(FsError::NoSuchFile { .. })
    ));
    assert!(!fs.exists(&p(&fs, "/missing")));
}

#[test]
fn unknown_initial_attribute_fails_before_creating() {
    let fs = posix_fs();
    let file = p(&fs, "/never");

    for name in ["posix:bogus", "dos:hidden", "nosuchview:owner"] {
        let attr = FileAttribute::new(name, AttributeValue::Bool(true));
        assert!(
            matches!(
                fs.create_file(&file, &[attr]),
                Err(FsError::UnsupportedAttribute { .. })
            ),
            "{name} should be rejected"
        );
    }
    let wrong_type = FileAttribute::new("posix:permissions", AttributeValue::Bool(true));
    assert!(matches!(
        fs.create_file(&file, &[wrong_type]),
        Err(FsError::InvalidAttributeValue { .. })
    ));
    assert!(!fs.exists(&file));
}
