//! Container fixtures shared by the unit tests.

use crate::classpath::ClassPath;
use dz_dex::classes::{ClassDataItem, ClassDefItem, ClassFlags};
use dz_dex::code::CodeItem;
use dz_dex::fields::{EncodedField, FieldFlags};
use dz_dex::methods::{EncodedMethod, MethodFlags};
use dz_dex::Dex;

/// Declarative class description, turned into container items by [`ClassBuilder::build`].
pub(crate) struct ClassBuilder {
    name: String,
    superclass: Option<String>,
    flags: ClassFlags,
    interfaces: Vec<String>,
    direct_methods: Vec<(String, MethodFlags, Option<CodeItem>)>,
    virtual_methods: Vec<(String, MethodFlags, Option<CodeItem>)>,
    instance_fields: Vec<(String, String)>,
    static_fields: Vec<(String, String)>,
}

impl ClassBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: Some("Ljava/lang/Object;".to_string()),
            flags: ClassFlags::ACC_PUBLIC,
            interfaces: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            instance_fields: Vec::new(),
            static_fields: Vec::new(),
        }
    }

    pub(crate) fn interface(name: &str) -> Self {
        Self::new(name).flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT)
    }

    pub(crate) fn root(mut self) -> Self {
        self.superclass = None;
        self
    }

    pub(crate) fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub(crate) fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    /// `signature` is a short method string such as `f(I)V`.
    pub(crate) fn virtual_method(mut self, signature: &str, flags: MethodFlags, code: Option<CodeItem>) -> Self {
        self.virtual_methods.push((signature.to_string(), flags, code));
        self
    }

    pub(crate) fn direct_method(mut self, signature: &str, flags: MethodFlags, code: Option<CodeItem>) -> Self {
        self.direct_methods.push((signature.to_string(), flags, code));
        self
    }

    pub(crate) fn field(mut self, name: &str, type_: &str) -> Self {
        self.instance_fields.push((name.to_string(), type_.to_string()));
        self
    }

    pub(crate) fn static_field(mut self, name: &str, type_: &str) -> Self {
        self.static_fields.push((name.to_string(), type_.to_string()));
        self
    }

    pub(crate) fn build(self, dex: &mut Dex) {
        let class_idx = dex.intern_type(&self.name);
        let mut class = ClassDefItem::new(class_idx, self.flags);
        if let Some(superclass) = &self.superclass {
            class = class.with_superclass(dex.intern_type(superclass));
        }
        for interface in &self.interfaces {
            class = class.with_interface(dex.intern_type(interface));
        }

        let mut data = ClassDataItem::new();
        for (name, type_) in &self.static_fields {
            let idx = dex.intern_field_ref(&self.name, name, type_);
            data = data.with_static_field(EncodedField::new(idx, FieldFlags::ACC_STATIC));
        }
        for (name, type_) in &self.instance_fields {
            let idx = dex.intern_field_ref(&self.name, name, type_);
            data = data.with_instance_field(EncodedField::new(idx, FieldFlags::ACC_PUBLIC));
        }
        for (signature, flags, code) in self.direct_methods {
            let idx = method_ref(dex, &self.name, &signature);
            data = data.with_direct_method(EncodedMethod::new(idx, flags, code));
        }
        for (signature, flags, code) in self.virtual_methods {
            let idx = method_ref(dex, &self.name, &signature);
            data = data.with_virtual_method(EncodedMethod::new(idx, flags, code));
        }
        dex.add_class(class.with_class_data(data));
    }
}

pub(crate) fn method_ref(
    dex: &mut Dex,
    class: &str,
    signature: &str,
) -> dz_dex::Index<dz_dex::methods::MethodIdItem> {
    let paren = signature.find('(').unwrap();
    dex.intern_method_descriptor(class, &signature[..paren], &signature[paren..])
        .unwrap()
}

pub(crate) fn constructor() -> MethodFlags {
    MethodFlags::ACC_PUBLIC | MethodFlags::ACC_CONSTRUCTOR
}

/// Minimal boot container: the root object class, a few core classes and interfaces.
pub(crate) fn boot_container() -> Dex {
    let mut dex = Dex::new();
    let public = MethodFlags::ACC_PUBLIC;
    let abstract_ = MethodFlags::ACC_PUBLIC | MethodFlags::ACC_ABSTRACT;

    ClassBuilder::new("Ljava/lang/Object;")
        .root()
        .direct_method("<init>()V", constructor(), None)
        .virtual_method("toString()Ljava/lang/String;", public, None)
        .virtual_method("equals(Ljava/lang/Object;)Z", public, None)
        .virtual_method("hashCode()I", public, None)
        .build(&mut dex);
    ClassBuilder::interface("Ljava/lang/Cloneable;").build(&mut dex);
    ClassBuilder::interface("Ljava/io/Serializable;").build(&mut dex);
    ClassBuilder::interface("Ljava/lang/Runnable;")
        .virtual_method("run()V", abstract_, None)
        .build(&mut dex);
    ClassBuilder::new("Ljava/lang/String;")
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL)
        .implements("Ljava/io/Serializable;")
        .direct_method("<init>()V", constructor(), None)
        .virtual_method("length()I", public, None)
        .virtual_method("charAt(I)C", public, None)
        .virtual_method("toString()Ljava/lang/String;", public, None)
        .build(&mut dex);
    ClassBuilder::new("Ljava/lang/Class;")
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL)
        .build(&mut dex);
    ClassBuilder::new("Ljava/lang/Throwable;")
        .implements("Ljava/io/Serializable;")
        .direct_method("<init>()V", constructor(), None)
        .virtual_method("getMessage()Ljava/lang/String;", public, None)
        .field("detailMessage", "Ljava/lang/String;")
        .build(&mut dex);
    ClassBuilder::new("Ljava/lang/Exception;")
        .extends("Ljava/lang/Throwable;")
        .direct_method("<init>()V", constructor(), None)
        .build(&mut dex);
    dex
}

/// Class path holding the boot container only.
pub(crate) fn class_path() -> ClassPath {
    let boot = boot_container();
    ClassPath::from_containers([("boot", &boot)], false).unwrap()
}

/// Class path holding the boot container followed by the given container.
pub(crate) fn class_path_with(dex: &Dex) -> ClassPath {
    let boot = boot_container();
    ClassPath::from_containers([("boot", &boot), ("app", dex)], false).unwrap()
}
