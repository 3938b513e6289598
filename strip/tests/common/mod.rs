use std::{fs::File, io::Write, path::Path};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn utf8(out: &mut Vec<u8>, s: &str) {
    out.push(1);
    put_u2(out, s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

/// A `public final` class named `name` holding one `public static final int` with a constant
/// value, and an `InnerClasses` record marked `public static final`.
pub fn accessor_class(name: &str) -> Vec<u8> {
    let mut c = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52];
    put_u2(&mut c, 11);
    utf8(&mut c, name); // 1
    c.extend_from_slice(&[7, 0, 1]); // 2
    utf8(&mut c, "java/lang/Object"); // 3
    c.extend_from_slice(&[7, 0, 3]); // 4
    utf8(&mut c, "app_name"); // 5
    utf8(&mut c, "I"); // 6
    utf8(&mut c, "ConstantValue"); // 7
    c.extend_from_slice(&[3, 0x7f, 0x0e, 0x00, 0x01]); // 8
    utf8(&mut c, "InnerClasses"); // 9
    utf8(&mut c, "SourceFile"); // 10

    put_u2(&mut c, 0x0031);
    put_u2(&mut c, 2);
    put_u2(&mut c, 4);
    put_u2(&mut c, 0);

    put_u2(&mut c, 1);
    put_u2(&mut c, 0x0019);
    put_u2(&mut c, 5);
    put_u2(&mut c, 6);
    put_u2(&mut c, 1);
    put_u2(&mut c, 7);
    c.extend_from_slice(&2u32.to_be_bytes());
    put_u2(&mut c, 8);

    put_u2(&mut c, 0);

    put_u2(&mut c, 2);
    put_u2(&mut c, 9);
    c.extend_from_slice(&10u32.to_be_bytes());
    put_u2(&mut c, 1);
    put_u2(&mut c, 2);
    put_u2(&mut c, 4);
    put_u2(&mut c, 5);
    put_u2(&mut c, 0x0019);
    put_u2(&mut c, 10);
    c.extend_from_slice(&2u32.to_be_bytes());
    put_u2(&mut c, 5);
    c
}

pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>, CompressionMethod)]) {
    let file = File::create(path).expect("create jar");
    let mut zip = ZipWriter::new(file);
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        zip.start_file(*name, options).expect("start entry");
        zip.write_all(data).expect("write entry");
    }
    zip.finish().expect("finish jar");
}
