//! The slice of the Java class-file format needed to reach the constant
//! value of a static field.
//!
//! Everything is parsed in a single forward pass so the cursor stays in
//! step with the structure; methods and class-level attributes are read
//! only to keep that invariant, never interpreted.

use crate::reader::ClassReader;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_INTEGER: u8 = 3;
pub const CONSTANT_FLOAT: u8 = 4;
pub const CONSTANT_LONG: u8 = 5;
pub const CONSTANT_DOUBLE: u8 = 6;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELDREF: u8 = 9;
pub const CONSTANT_METHODREF: u8 = 10;
pub const CONSTANT_INTERFACE_METHODREF: u8 = 11;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub const CONSTANT_METHOD_HANDLE: u8 = 15;
pub const CONSTANT_METHOD_TYPE: u8 = 16;
pub const CONSTANT_DYNAMIC: u8 = 17;
pub const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub const CONSTANT_MODULE: u8 = 19;
pub const CONSTANT_PACKAGE: u8 = 20;

const CONSTANT_VALUE_ATTRIBUTE: &str = "ConstantValue";

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    /// Number of constant-pool slots the entry occupies. 8-byte constants
    /// take two; the second one is never addressable.
    pub fn slots(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

type ReadConstant = fn(&mut ClassReader<'_>) -> Constant;

/// Tag byte to entry reader.
static CONSTANT_READERS: [Option<ReadConstant>; 21] = [
    None,
    Some(read_utf8),
    None,
    Some(read_integer),
    Some(read_float),
    Some(read_long),
    Some(read_double),
    Some(read_class),
    Some(read_string),
    Some(read_fieldref),
    Some(read_methodref),
    Some(read_interface_methodref),
    Some(read_name_and_type),
    None,
    None,
    Some(read_method_handle),
    Some(read_method_type),
    Some(read_dynamic),
    Some(read_invoke_dynamic),
    Some(read_module),
    Some(read_package),
];

fn read_utf8(r: &mut ClassReader<'_>) -> Constant {
    let len = r.read_u16() as usize;
    Constant::Utf8(String::from_utf8_lossy(r.read_bytes(len)).into_owned())
}

fn read_integer(r: &mut ClassReader<'_>) -> Constant {
    Constant::Integer(r.read_u32())
}

fn read_float(r: &mut ClassReader<'_>) -> Constant {
    Constant::Float(r.read_u32())
}

fn read_long(r: &mut ClassReader<'_>) -> Constant {
    let high = r.read_u32() as u64;
    let low = r.read_u32() as u64;
    Constant::Long((high << 32) | low)
}

fn read_double(r: &mut ClassReader<'_>) -> Constant {
    let high = r.read_u32() as u64;
    let low = r.read_u32() as u64;
    Constant::Double((high << 32) | low)
}

fn read_class(r: &mut ClassReader<'_>) -> Constant {
    Constant::Class {
        name_index: r.read_u16(),
    }
}

fn read_string(r: &mut ClassReader<'_>) -> Constant {
    Constant::String {
        string_index: r.read_u16(),
    }
}

fn read_fieldref(r: &mut ClassReader<'_>) -> Constant {
    Constant::FieldRef {
        class_index: r.read_u16(),
        name_and_type_index: r.read_u16(),
    }
}

fn read_methodref(r: &mut ClassReader<'_>) -> Constant {
    Constant::MethodRef {
        class_index: r.read_u16(),
        name_and_type_index: r.read_u16(),
    }
}

fn read_interface_methodref(r: &mut ClassReader<'_>) -> Constant {
    Constant::InterfaceMethodRef {
        class_index: r.read_u16(),
        name_and_type_index: r.read_u16(),
    }
}

fn read_name_and_type(r: &mut ClassReader<'_>) -> Constant {
    Constant::NameAndType {
        name_index: r.read_u16(),
        descriptor_index: r.read_u16(),
    }
}

fn read_method_handle(r: &mut ClassReader<'_>) -> Constant {
    Constant::MethodHandle {
        reference_kind: r.read_u8(),
        reference_index: r.read_u16(),
    }
}

fn read_method_type(r: &mut ClassReader<'_>) -> Constant {
    Constant::MethodType {
        descriptor_index: r.read_u16(),
    }
}

fn read_dynamic(r: &mut ClassReader<'_>) -> Constant {
    Constant::Dynamic {
        bootstrap_method_attr_index: r.read_u16(),
        name_and_type_index: r.read_u16(),
    }
}

fn read_invoke_dynamic(r: &mut ClassReader<'_>) -> Constant {
    Constant::InvokeDynamic {
        bootstrap_method_attr_index: r.read_u16(),
        name_and_type_index: r.read_u16(),
    }
}

fn read_module(r: &mut ClassReader<'_>) -> Constant {
    Constant::Module {
        name_index: r.read_u16(),
    }
}

fn read_package(r: &mut ClassReader<'_>) -> Constant {
    Constant::Package {
        name_index: r.read_u16(),
    }
}

/// 1-indexed constant pool. Slot 0 and the upper half of every long or
/// double entry are empty.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    fn read(r: &mut ClassReader<'_>) -> Self {
        let count = r.read_u16() as usize;
        let mut entries = vec![None; count.max(1)];
        let mut slot = 1;
        while slot < count {
            let tag = r.read_u8();
            let read = CONSTANT_READERS
                .get(tag as usize)
                .copied()
                .flatten()
                .unwrap_or_else(|| panic!("invalid constant pool tag {tag} at slot {slot}"));
            let constant = read(r);
            let slots = constant.slots();
            entries[slot] = Some(constant);
            slot += slots;
        }
        Self { entries }
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Resolves a `CONSTANT_String` entry to its text.
    pub fn string(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::String { string_index } => self.utf8(*string_index),
            _ => None,
        }
    }

    /// Declared pool count, including the unused slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    ConstantValue { value_index: u16 },
    Other { name_index: u16, length: u32 },
}

#[derive(Debug, Clone)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

pub type Field = Member;
pub type Method = Member;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parses a complete class file.
    ///
    /// # Panics
    ///
    /// Panics when the magic number is wrong, a constant-pool tag is unknown,
    /// or the buffer ends before the structure does. Only class files taken
    /// from a runtime's own packaged metadata are expected here.
    pub fn parse(bytes: &[u8]) -> ClassFile {
        let mut reader = ClassReader::new(bytes);
        Self::parse_from(&mut reader)
    }

    pub fn parse_from(r: &mut ClassReader<'_>) -> ClassFile {
        let magic = r.read_u32();
        assert!(
            magic == MAGIC,
            "not a class file: magic {magic:#010x}, expected {MAGIC:#010x}"
        );

        let minor_version = r.read_u16();
        let major_version = r.read_u16();
        let constant_pool = ConstantPool::read(r);
        let access_flags = r.read_u16();
        let this_class = r.read_u16();
        let super_class = r.read_u16();

        let interface_count = r.read_u16();
        let interfaces = (0..interface_count).map(|_| r.read_u16()).collect();

        let fields = read_members(r, &constant_pool);
        let methods = read_members(r, &constant_pool);
        let attributes = read_attributes(r, &constant_pool);

        ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        }
    }

    /// Iterates `(field name, string constant)` for every field whose
    /// `ConstantValue` attribute points at a string.
    pub fn string_constants(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let cp = &self.constant_pool;
        self.fields.iter().flat_map(move |field| {
            let name = cp.utf8(field.name_index);
            field.attributes.iter().filter_map(move |attr| match attr {
                Attribute::ConstantValue { value_index } => Some((name?, cp.string(*value_index)?)),
                Attribute::Other { .. } => None,
            })
        })
    }
}

fn read_members(r: &mut ClassReader<'_>, cp: &ConstantPool) -> Vec<Member> {
    let count = r.read_u16();
    (0..count)
        .map(|_| Member {
            access_flags: r.read_u16(),
            name_index: r.read_u16(),
            descriptor_index: r.read_u16(),
            attributes: read_attributes(r, cp),
        })
        .collect()
}

fn read_attributes(r: &mut ClassReader<'_>, cp: &ConstantPool) -> Vec<Attribute> {
    let count = r.read_u16();
    (0..count).map(|_| read_attribute(r, cp)).collect()
}

fn read_attribute(r: &mut ClassReader<'_>, cp: &ConstantPool) -> Attribute {
    let name_index = r.read_u16();
    let length = r.read_u32();

    if cp.utf8(name_index) == Some(CONSTANT_VALUE_ATTRIBUTE) && length >= 2 {
        let value_index = r.read_u16();
        r.read_bytes(length as usize - 2);
        return Attribute::ConstantValue { value_index };
    }

    r.read_bytes(length as usize);
    Attribute::Other { name_index, length }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Assembles minimal class files for tests.
    #[derive(Debug, Default)]
    pub struct ClassBuilder {
        pool: Vec<u8>,
        next_slot: u16,
        fields: Vec<u8>,
        field_count: u16,
        constant_value_name: Option<u16>,
    }

    impl ClassBuilder {
        pub fn new() -> Self {
            Self {
                next_slot: 1,
                ..Self::default()
            }
        }

        fn push(&mut self, tag: u8, payload: &[u8], slots: u16) -> u16 {
            let index = self.next_slot;
            self.pool.push(tag);
            self.pool.extend_from_slice(payload);
            self.next_slot += slots;
            index
        }

        pub fn utf8(&mut self, value: &str) -> u16 {
            let mut payload = (value.len() as u16).to_be_bytes().to_vec();
            payload.extend_from_slice(value.as_bytes());
            self.push(CONSTANT_UTF8, &payload, 1)
        }

        pub fn string(&mut self, value: &str) -> u16 {
            let utf8 = self.utf8(value);
            self.push(CONSTANT_STRING, &utf8.to_be_bytes(), 1)
        }

        pub fn long(&mut self, value: u64) -> u16 {
            self.push(CONSTANT_LONG, &value.to_be_bytes(), 2)
        }

        pub fn double(&mut self, value: f64) -> u16 {
            self.push(CONSTANT_DOUBLE, &value.to_bits().to_be_bytes(), 2)
        }

        pub fn integer(&mut self, value: u32) -> u16 {
            self.push(CONSTANT_INTEGER, &value.to_be_bytes(), 1)
        }

        pub fn method_handle(&mut self, kind: u8, reference: u16) -> u16 {
            let mut payload = vec![kind];
            payload.extend_from_slice(&reference.to_be_bytes());
            self.push(CONSTANT_METHOD_HANDLE, &payload, 1)
        }

        pub fn raw(&mut self, tag: u8, payload: &[u8]) -> u16 {
            self.push(tag, payload, 1)
        }

        /// Adds a `static final String` field with a `ConstantValue`
        /// attribute plus an unrelated attribute that must be skipped.
        pub fn string_field(&mut self, name: &str, value: &str) -> &mut Self {
            let name_index = self.utf8(name);
            let descriptor = self.utf8("Ljava/lang/String;");
            let value_index = self.string(value);
            let attr_name = match self.constant_value_name {
                Some(index) => index,
                None => {
                    let index = self.utf8(CONSTANT_VALUE_ATTRIBUTE);
                    self.constant_value_name = Some(index);
                    index
                }
            };
            let synthetic = self.utf8("Deprecated");

            self.fields.extend_from_slice(&0x0019u16.to_be_bytes());
            self.fields.extend_from_slice(&name_index.to_be_bytes());
            self.fields.extend_from_slice(&descriptor.to_be_bytes());
            self.fields.extend_from_slice(&2u16.to_be_bytes());
            self.fields.extend_from_slice(&synthetic.to_be_bytes());
            self.fields.extend_from_slice(&3u32.to_be_bytes());
            self.fields.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
            self.fields.extend_from_slice(&attr_name.to_be_bytes());
            self.fields.extend_from_slice(&2u32.to_be_bytes());
            self.fields.extend_from_slice(&value_index.to_be_bytes());
            self.field_count += 1;
            self
        }

        pub fn build(&mut self) -> Vec<u8> {
            let code_name = self.utf8("Code");
            let method_name = self.utf8("<clinit>");
            let method_desc = self.utf8("()V");
            let source_file = self.utf8("SourceFile");
            let source_name = self.utf8("Version.java");

            let mut out = Vec::new();
            out.extend_from_slice(&MAGIC.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&52u16.to_be_bytes());
            out.extend_from_slice(&self.next_slot.to_be_bytes());
            out.extend_from_slice(&self.pool);
            out.extend_from_slice(&0x0031u16.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());

            out.extend_from_slice(&self.field_count.to_be_bytes());
            out.extend_from_slice(&self.fields);

            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&0x0008u16.to_be_bytes());
            out.extend_from_slice(&method_name.to_be_bytes());
            out.extend_from_slice(&method_desc.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&code_name.to_be_bytes());
            out.extend_from_slice(&5u32.to_be_bytes());
            out.extend_from_slice(&[0x00, 0x01, 0x02, 0x03, 0xB1]);

            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&source_file.to_be_bytes());
            out.extend_from_slice(&2u32.to_be_bytes());
            out.extend_from_slice(&source_name.to_be_bytes());
            out
        }
    }
}
