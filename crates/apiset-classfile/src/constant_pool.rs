use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::reader::{Reader, Writer};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
    /// Second slot of a `Long`/`Double` entry.
    Unusable,
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class(_) => "Class",
            CpInfo::String(_) => "String",
            CpInfo::FieldRef(..) => "Fieldref",
            CpInfo::MethodRef(..) => "Methodref",
            CpInfo::InterfaceMethodRef(..) => "InterfaceMethodref",
            CpInfo::NameAndType(..) => "NameAndType",
            CpInfo::MethodHandle(..) => "MethodHandle",
            CpInfo::MethodType(_) => "MethodType",
            CpInfo::Dynamic(..) => "Dynamic",
            CpInfo::InvokeDynamic(..) => "InvokeDynamic",
            CpInfo::Module(_) => "Module",
            CpInfo::Package(_) => "Package",
            CpInfo::Unusable => "Unusable",
        }
    }
}

pub(crate) struct ConstantPool {
    // Index 0 is unused, mirroring the JVM's 1-based numbering.
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(CpInfo::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let info = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    CpInfo::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                3 => CpInfo::Integer(reader.read_u4()? as i32),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(reader.read_u8()? as i64),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class(reader.read_u2()?),
                8 => CpInfo::String(reader.read_u2()?),
                9 => CpInfo::FieldRef(reader.read_u2()?, reader.read_u2()?),
                10 => CpInfo::MethodRef(reader.read_u2()?, reader.read_u2()?),
                11 => CpInfo::InterfaceMethodRef(reader.read_u2()?, reader.read_u2()?),
                12 => CpInfo::NameAndType(reader.read_u2()?, reader.read_u2()?),
                15 => CpInfo::MethodHandle(reader.read_u1()?, reader.read_u2()?),
                16 => CpInfo::MethodType(reader.read_u2()?),
                17 => CpInfo::Dynamic(reader.read_u2()?, reader.read_u2()?),
                18 => CpInfo::InvokeDynamic(reader.read_u2()?, reader.read_u2()?),
                19 => CpInfo::Module(reader.read_u2()?),
                20 => CpInfo::Package(reader.read_u2()?),
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };
            let wide = matches!(info, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(info);
            if wide {
                entries.push(CpInfo::Unusable);
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo> {
        match self.entries.get(index as usize) {
            Some(CpInfo::Unusable) | None => Err(Error::InvalidConstantPoolIndex(index)),
            Some(info) => Ok(info),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class(name_index) => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_string_constant(&self, index: u16) -> Result<String> {
        // Annotation `s` values point straight at a Utf8 entry; `ConstantValue` points at a
        // `String` entry. Accept both.
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s.clone()),
            CpInfo::String(utf8) => Ok(self.get_utf8(*utf8)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "String",
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    MethodRef(u16, u16),
}

/// Deduplicating constant pool used by the class writer.
#[derive(Default)]
pub(crate) struct ConstantPoolBuilder {
    entries: Vec<PoolKey>,
    index: HashMap<PoolKey, u16>,
    // Next free slot; `Long`/`Double` take two.
    next: u16,
}

impl ConstantPoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            next: 1,
            ..Self::default()
        }
    }

    fn intern(&mut self, key: PoolKey) -> Result<u16> {
        if let Some(idx) = self.index.get(&key) {
            return Ok(*idx);
        }
        let slots = match key {
            PoolKey::Long(_) | PoolKey::Double(_) => 2,
            _ => 1,
        };
        let idx = self.next;
        self.next = self
            .next
            .checked_add(slots)
            .ok_or(Error::ConstantPoolOverflow)?;
        self.index.insert(key.clone(), idx);
        self.entries.push(key);
        Ok(idx)
    }

    pub(crate) fn utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(PoolKey::Utf8(value.to_string()))
    }

    pub(crate) fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.intern(PoolKey::Class(name))
    }

    pub(crate) fn string(&mut self, value: &str) -> Result<u16> {
        let utf8 = self.utf8(value)?;
        self.intern(PoolKey::String(utf8))
    }

    pub(crate) fn integer(&mut self, value: i32) -> Result<u16> {
        self.intern(PoolKey::Integer(value))
    }

    pub(crate) fn float(&mut self, value: f32) -> Result<u16> {
        self.intern(PoolKey::Float(value.to_bits()))
    }

    pub(crate) fn long(&mut self, value: i64) -> Result<u16> {
        self.intern(PoolKey::Long(value))
    }

    pub(crate) fn double(&mut self, value: f64) -> Result<u16> {
        self.intern(PoolKey::Double(value.to_bits()))
    }

    pub(crate) fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(PoolKey::NameAndType(name, descriptor))
    }

    pub(crate) fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(PoolKey::MethodRef(class, nat))
    }

    pub(crate) fn write(&self, out: &mut Writer) {
        out.u2(self.next);
        for entry in &self.entries {
            match entry {
                PoolKey::Utf8(s) => {
                    let bytes = encode_modified_utf8(s);
                    out.u1(1);
                    // Strings longer than a u2 cannot be represented; the writer validates
                    // lengths of everything it interns before calling `write`.
                    out.u2(bytes.len() as u16);
                    out.bytes(&bytes);
                }
                PoolKey::Integer(v) => {
                    out.u1(3);
                    out.u4(*v as u32);
                }
                PoolKey::Float(bits) => {
                    out.u1(4);
                    out.u4(*bits);
                }
                PoolKey::Long(v) => {
                    out.u1(5);
                    out.u8(*v as u64);
                }
                PoolKey::Double(bits) => {
                    out.u1(6);
                    out.u8(*bits);
                }
                PoolKey::Class(name) => {
                    out.u1(7);
                    out.u2(*name);
                }
                PoolKey::String(utf8) => {
                    out.u1(8);
                    out.u2(*utf8);
                }
                PoolKey::MethodRef(class, nat) => {
                    out.u1(10);
                    out.u2(*class);
                    out.u2(*nat);
                }
                PoolKey::NameAndType(name, descriptor) => {
                    out.u1(12);
                    out.u2(*name);
                    out.u2(*descriptor);
                }
            }
        }
    }

    pub(crate) fn check_lengths(&self) -> Result<()> {
        for entry in &self.entries {
            if let PoolKey::Utf8(s) = entry {
                if encode_modified_utf8(s).len() > u16::MAX as usize {
                    return Err(Error::TooLarge("Utf8 constant"));
                }
            }
        }
        Ok(())
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push((((b0 & 0x1F) as u16) << 6) | (b1 & 0x3F) as u16);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            let b2 = *bytes.get(i + 2).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(
                (((b0 & 0x0F) as u16) << 12) | (((b1 & 0x3F) as u16) << 6) | (b2 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }
    // Surrogate pairs are encoded as two 3-byte sequences, so UTF-16 decoding restores them.
    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}

fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_utf8_handles_nul_and_supplementary_chars() {
        let text = "a\u{0}é\u{1F600}";
        let encoded = encode_modified_utf8(text);
        assert!(!encoded.contains(&0));
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), text);
    }

    #[test]
    fn builder_deduplicates_and_reserves_wide_slots() {
        let mut pool = ConstantPoolBuilder::new();
        let a = pool.utf8("A").unwrap();
        let long = pool.long(7).unwrap();
        let b = pool.utf8("B").unwrap();
        assert_eq!(pool.utf8("A").unwrap(), a);
        assert_eq!(long, 2);
        assert_eq!(b, 4);

        let mut out = Writer::new();
        pool.write(&mut out);
        let bytes = out.into_bytes();
        let parsed = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(parsed.get_utf8(a).unwrap(), "A");
        assert_eq!(parsed.get(long).unwrap(), &CpInfo::Long(7));
        assert!(parsed.get(long + 1).is_err());
        assert_eq!(parsed.get_utf8(b).unwrap(), "B");
    }
}
