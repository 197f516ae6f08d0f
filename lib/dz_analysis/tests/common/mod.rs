#![allow(dead_code)]

use dz_dex::classes::{ClassDataItem, ClassDefItem, ClassFlags};
use dz_dex::code::CodeItem;
use dz_dex::fields::{EncodedField, FieldFlags};
use dz_dex::methods::{EncodedMethod, MethodFlags, MethodIdItem};
use dz_dex::{Dex, DexIndex, Index};
use std::path::Path;

pub const OBJECT: &str = "Ljava/lang/Object;";
pub const STRING: &str = "Ljava/lang/String;";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn method_ref(dex: &mut Dex, class: &str, signature: &str) -> Index<MethodIdItem> {
    let paren = signature.find('(').unwrap();
    dex.intern_method_descriptor(class, &signature[..paren], &signature[paren..])
        .unwrap()
}

/// Appends a class definition built from short descriptions to the container.
pub struct Class<'a> {
    name: &'a str,
    superclass: Option<&'a str>,
    flags: ClassFlags,
    fields: Vec<(&'a str, &'a str)>,
    direct: Vec<(&'a str, MethodFlags, Option<CodeItem>)>,
    virtual_: Vec<(&'a str, MethodFlags, Option<CodeItem>)>,
}

impl<'a> Class<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            superclass: Some(OBJECT),
            flags: ClassFlags::ACC_PUBLIC,
            fields: Vec::new(),
            direct: Vec::new(),
            virtual_: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: Option<&'a str>) -> Self {
        self.superclass = superclass;
        self
    }

    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn field(mut self, name: &'a str, type_: &'a str) -> Self {
        self.fields.push((name, type_));
        self
    }

    pub fn direct(mut self, signature: &'a str, flags: MethodFlags, code: Option<CodeItem>) -> Self {
        self.direct.push((signature, flags, code));
        self
    }

    pub fn virtual_(mut self, signature: &'a str, code: Option<CodeItem>) -> Self {
        self.virtual_.push((signature, MethodFlags::ACC_PUBLIC, code));
        self
    }

    pub fn add_to(self, dex: &mut Dex) {
        let class_idx = dex.intern_type(self.name);
        let mut class = ClassDefItem::new(class_idx, self.flags);
        if let Some(superclass) = self.superclass {
            class = class.with_superclass(dex.intern_type(superclass));
        }
        let mut data = ClassDataItem::new();
        for (name, type_) in self.fields {
            let idx = dex.intern_field_ref(self.name, name, type_);
            data = data.with_instance_field(EncodedField::new(idx, FieldFlags::ACC_PRIVATE));
        }
        for (signature, flags, code) in self.direct {
            let idx = method_ref(dex, self.name, signature);
            data = data.with_direct_method(EncodedMethod::new(idx, flags, code));
        }
        for (signature, flags, code) in self.virtual_ {
            let idx = method_ref(dex, self.name, signature);
            data = data.with_virtual_method(EncodedMethod::new(idx, flags, code));
        }
        dex.add_class(class.with_class_data(data));
    }
}

/// Core library container: root object, strings and throwables.
pub fn core_container() -> Dex {
    let mut dex = Dex::new();
    let constructor = MethodFlags::ACC_PUBLIC | MethodFlags::ACC_CONSTRUCTOR;
    Class::new(OBJECT)
        .extends(None)
        .direct("<init>()V", constructor, None)
        .virtual_("toString()Ljava/lang/String;", None)
        .virtual_("equals(Ljava/lang/Object;)Z", None)
        .virtual_("hashCode()I", None)
        .add_to(&mut dex);
    Class::new(STRING)
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL)
        .virtual_("charAt(I)C", None)
        .virtual_("length()I", None)
        .add_to(&mut dex);
    Class::new("Ljava/lang/Throwable;").add_to(&mut dex);
    Class::new("Ljava/lang/Cloneable;")
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT)
        .add_to(&mut dex);
    Class::new("Ljava/io/Serializable;")
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT)
        .add_to(&mut dex);
    dex
}

/// Saves the core container under the given file name of `dir`.
pub fn write_core(dir: &Path, file_name: &str) {
    dz_dex::save(&core_container(), dir.join(file_name)).unwrap();
}

/// Finds a method of the given class by name.
pub fn find_method(dex: &Dex, class: &str, name: &str) -> EncodedMethod {
    dex.find_class_def(class)
        .and_then(|class| class.class_data())
        .and_then(|data| {
            data.iter_methods()
                .find(|method| method.index().get(dex).unwrap().name() == name)
        })
        .cloned()
        .unwrap()
}
