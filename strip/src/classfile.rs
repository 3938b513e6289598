/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Access-flag rewriting for JVM class files.
//!
//! Only the access flags of the class, its fields and its `InnerClasses` records are ever
//! changed, and field attributes may be dropped. Every other byte, method bodies included, is
//! copied from the input as it is.

use thiserror::Error;

pub const ACC_FINAL: u16 = 0x0010;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),
    #[error("{0} unexpected bytes after the last attribute")]
    TrailingBytes(usize),
}

/// Sees every access flag of a class file in order and decides what to write back.
pub trait AccessVisitor {
    fn visit_class(&mut self, access: u16) -> u16 {
        access
    }

    fn visit_field(&mut self, access: u16) -> u16 {
        access
    }

    /// Called for each attribute of the field last passed to `visit_field`. Returning false drops
    /// the attribute from the output.
    fn keep_field_attribute(&mut self, _name: &[u8]) -> bool {
        true
    }

    fn visit_inner_class(&mut self, access: u16) -> u16 {
        access
    }
}

/// Clears `ACC_FINAL` everywhere a subclass or a reassignment could trip over it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalStripper {
    pub erase_field_constants: bool,
}

impl AccessVisitor for FinalStripper {
    fn visit_class(&mut self, access: u16) -> u16 {
        access & !ACC_FINAL
    }

    fn visit_field(&mut self, access: u16) -> u16 {
        access & !ACC_FINAL
    }

    fn keep_field_attribute(&mut self, name: &[u8]) -> bool {
        !(self.erase_field_constants && name == b"ConstantValue")
    }

    fn visit_inner_class(&mut self, access: u16) -> u16 {
        access & !ACC_FINAL
    }
}

/// The access flags of a class file, in declaration order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccessSummary {
    pub class: u16,
    pub fields: Vec<u16>,
    pub field_attributes: Vec<Vec<String>>,
    pub inner_classes: Vec<u16>,
}

impl AccessVisitor for AccessSummary {
    fn visit_class(&mut self, access: u16) -> u16 {
        self.class = access;
        access
    }

    fn visit_field(&mut self, access: u16) -> u16 {
        self.fields.push(access);
        self.field_attributes.push(vec![]);
        access
    }

    fn keep_field_attribute(&mut self, name: &[u8]) -> bool {
        if let Some(names) = self.field_attributes.last_mut() {
            names.push(String::from_utf8_lossy(name).into_owned());
        }
        true
    }

    fn visit_inner_class(&mut self, access: u16) -> u16 {
        self.inner_classes.push(access);
        access
    }
}

pub fn inspect(bytes: &[u8]) -> Result<AccessSummary, ClassFileError> {
    let mut summary = AccessSummary::default();
    rewrite(bytes, &mut summary)?;
    Ok(summary)
}

pub fn strip_final(bytes: &[u8], erase_field_constants: bool) -> Result<Vec<u8>, ClassFileError> {
    rewrite(
        bytes,
        &mut FinalStripper {
            erase_field_constants,
        },
    )
}

/// Walks `bytes` and returns a copy with every access flag replaced by what `visitor` returned.
pub fn rewrite<V: AccessVisitor>(bytes: &[u8], visitor: &mut V) -> Result<Vec<u8>, ClassFileError> {
    let mut reader = ClassReader::new(bytes);
    let mut out = Vec::with_capacity(bytes.len());

    reader.expect_magic()?;
    reader.skip(4)?; // minor, major
    let pool = ConstantPool::parse(&mut reader)?;
    out.extend_from_slice(&bytes[..reader.pos]);

    let access = reader.read_u2()?;
    put_u2(&mut out, visitor.visit_class(access));

    let start = reader.pos;
    reader.skip(4)?; // this_class, super_class
    let interfaces = reader.read_u2()?;
    reader.skip(2 * interfaces as usize)?;
    out.extend_from_slice(&bytes[start..reader.pos]);

    let fields = reader.read_u2()?;
    put_u2(&mut out, fields);
    for _ in 0..fields {
        let access = reader.read_u2()?;
        put_u2(&mut out, visitor.visit_field(access));
        out.extend_from_slice(reader.read_slice(4)?); // name, descriptor

        let count = reader.read_u2()?;
        let mut kept = Vec::new();
        let mut kept_count: u16 = 0;
        for _ in 0..count {
            let start = reader.pos;
            let name = pool.utf8(reader.read_u2()?)?;
            let len = reader.read_u4()? as usize;
            reader.skip(len)?;
            if visitor.keep_field_attribute(name) {
                kept.extend_from_slice(&bytes[start..reader.pos]);
                kept_count += 1;
            }
        }
        put_u2(&mut out, kept_count);
        out.extend_from_slice(&kept);
    }

    let start = reader.pos;
    let methods = reader.read_u2()?;
    for _ in 0..methods {
        reader.skip(6)?;
        let count = reader.read_u2()?;
        skip_attributes(&mut reader, count)?;
    }
    out.extend_from_slice(&bytes[start..reader.pos]);

    let count = reader.read_u2()?;
    put_u2(&mut out, count);
    for _ in 0..count {
        let start = reader.pos;
        let name = pool.utf8(reader.read_u2()?)?;
        let len = reader.read_u4()? as usize;
        out.extend_from_slice(&bytes[start..reader.pos]);
        let body = reader.read_slice(len)?;
        if name == b"InnerClasses" {
            rewrite_inner_classes(body, &mut out, visitor)?;
        } else {
            out.extend_from_slice(body);
        }
    }

    match reader.remaining() {
        0 => Ok(out),
        n => Err(ClassFileError::TrailingBytes(n)),
    }
}

fn rewrite_inner_classes<V: AccessVisitor>(
    body: &[u8],
    out: &mut Vec<u8>,
    visitor: &mut V,
) -> Result<(), ClassFileError> {
    let mut reader = ClassReader::new(body);
    let count = reader
        .read_u2()
        .map_err(|_| ClassFileError::MalformedAttribute("InnerClasses"))?;
    if body.len() != 2 + 8 * count as usize {
        return Err(ClassFileError::MalformedAttribute("InnerClasses"));
    }
    put_u2(out, count);
    for _ in 0..count {
        // inner_class_info, outer_class_info, inner_name
        out.extend_from_slice(reader.read_slice(6)?);
        let access = reader.read_u2()?;
        put_u2(out, visitor.visit_inner_class(access));
    }
    Ok(())
}

fn skip_attributes(reader: &mut ClassReader<'_>, count: u16) -> Result<(), ClassFileError> {
    for _ in 0..count {
        reader.skip(2)?;
        let len = reader.read_u4()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[derive(Debug, Clone, Copy)]
enum Constant<'a> {
    Utf8(&'a [u8]),
    Other,
    Unusable,
}

/// Only UTF-8 entries are kept, attribute names are all that is ever looked up.
struct ConstantPool<'a> {
    entries: Vec<Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    fn parse(reader: &mut ClassReader<'a>) -> Result<Self, ClassFileError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    Constant::Utf8(reader.read_slice(len)?)
                }
                // Integer, Float, Fieldref, Methodref, InterfaceMethodref, NameAndType, Dynamic,
                // InvokeDynamic
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                // Long and Double take two slots.
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    Constant::Unusable
                }
                // Class, String, MethodType, Module, Package
                7 | 8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                other => return Err(ClassFileError::UnsupportedConstant { tag: other }),
            };
            entries.push(entry);
        }

        Ok(ConstantPool { entries })
    }

    fn utf8(&self, index: u16) -> Result<&'a [u8], ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Constant::Utf8(value)) => Ok(value),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ClassReader { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassFileError> {
        if self.read_u4()? != MAGIC {
            return Err(ClassFileError::InvalidMagic);
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        if len > self.remaining() {
            return Err(ClassFileError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.read_slice(len).map(|_| ())
    }

    fn read_u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.read_slice(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.read_slice(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
