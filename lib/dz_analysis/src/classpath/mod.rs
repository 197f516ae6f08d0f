//! Class hierarchy resolution.
//!
//! The [`ClassPath`] collects the raw class records of the boot class path entries and of
//! the analyzed container, then materializes [`ClassDef`]s lazily, the first time a type
//! is looked up. Array, primitive and placeholder classes are synthesized on demand.

mod boot;
mod class_def;

pub use crate::classpath::class_def::{ClassDef, FieldDef, Flavor, MethodKind, VirtualMethod};

use crate::classpath::class_def::{layout_fields, ClassInfo};
use crate::config::ClassPathConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::uids::ClassUid;
use dz_dex::{ContainerLoader, Dex};
use log::{debug, warn};
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub const OBJECT: &str = "Ljava/lang/Object;";
pub const CLONEABLE: &str = "Ljava/lang/Cloneable;";
pub const SERIALIZABLE: &str = "Ljava/io/Serializable;";
pub const THROWABLE: &str = "Ljava/lang/Throwable;";

const PRIMITIVES: [&str; 8] = ["Z", "B", "S", "C", "I", "J", "F", "D"];
const MAX_ARRAY_DIMENSIONS: usize = 256;

/// Registry of every class definition known to an analysis session.
#[derive(Debug)]
pub struct ClassPath {
    classes: RefCell<Vec<Rc<ClassDef>>>,
    by_name: RefCell<BTreeMap<String, ClassUid>>,
    unloaded: RefCell<BTreeMap<String, ClassInfo>>,
    check_package_private_access: bool,
    unresolved_object: OnceCell<ClassUid>,
}

impl ClassPath {
    fn empty(check_package_private_access: bool) -> Self {
        Self {
            classes: RefCell::new(Vec::new()),
            by_name: RefCell::new(BTreeMap::new()),
            unloaded: RefCell::new(BTreeMap::new()),
            check_package_private_access,
            unresolved_object: OnceCell::new(),
        }
    }

    /// Builds a class path from already loaded containers, in priority order: the first
    /// definition of a class wins.
    pub fn from_containers<'a, I>(containers: I, check_package_private_access: bool) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a Dex)>,
    {
        let class_path = Self::empty(check_package_private_access);
        for (source, dex) in containers {
            class_path.collect_classes(source, dex)?;
        }
        class_path.finish()
    }

    /// Builds a class path from the configured boot entries, the extra entries and the
    /// analyzed container.
    pub fn initialize(
        config: &ClassPathConfig,
        source: &str,
        dex: &Dex,
        loader: &dyn ContainerLoader,
    ) -> AnalysisResult<Self> {
        Self::load(config, &config.boot_entries, source, dex, loader)
    }

    /// Same as [`ClassPath::initialize`], with boot entries taken from the dependencies
    /// recorded in an odex container.
    pub fn initialize_from_odex(
        config: &ClassPathConfig,
        source: &str,
        dex: &Dex,
        loader: &dyn ContainerLoader,
    ) -> AnalysisResult<Self> {
        let dependencies = dex.odex_dependencies().ok_or_else(|| {
            AnalysisError::config("Cannot initialize the class path from a non-odex container")
        })?;
        let boot_entries = boot::odex_boot_entries(dependencies)?;
        Self::load(config, &boot_entries, source, dex, loader)
    }

    fn load(
        config: &ClassPathConfig,
        boot_entries: &[String],
        source: &str,
        dex: &Dex,
        loader: &dyn ContainerLoader,
    ) -> AnalysisResult<Self> {
        let class_path = Self::empty(config.check_package_private_access);
        for entry in boot_entries.iter().chain(&config.extra_entries) {
            let (path, container) = boot::locate(&config.dirs, entry, loader)?;
            class_path
                .collect_classes(&path.display().to_string(), &container)
                .map_err(|err| {
                    err.context(format!("Error while loading boot classpath entry {entry}"))
                })?;
        }
        class_path.collect_classes(source, dex)?;
        class_path.finish()
    }

    fn collect_classes(&self, source: &str, dex: &Dex) -> AnalysisResult<()> {
        debug!("collecting {} classes from {source}", dex.class_defs_count());
        for class in dex.iter_class_defs() {
            let info = ClassInfo::from_class_def(class, dex, source).map_err(|err| {
                err.context(format!(
                    "Error while loading class {}",
                    class.class_descriptor(dex).unwrap_or("<invalid>")
                ))
            })?;
            self.unloaded
                .borrow_mut()
                .entry(info.name.clone())
                .or_insert(info);
        }
        Ok(())
    }

    fn finish(self) -> AnalysisResult<Self> {
        self.class_def(OBJECT, false)?;
        for primitive in PRIMITIVES {
            self.register(
                ClassDef {
                    uid: ClassUid::from_idx(0),
                    name: primitive.to_string(),
                    flavor: Flavor::Primitive,
                    superclass: None,
                    is_interface: false,
                    is_public: true,
                    depth: 0,
                    implemented_interfaces: BTreeMap::new(),
                    interface_table: Vec::new(),
                    virtual_methods: Vec::new(),
                    vtable: Vec::new(),
                    method_lookup: BTreeMap::new(),
                    instance_fields: BTreeMap::new(),
                },
                true,
            );
        }
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub const fn checks_package_private_access(&self) -> bool {
        self.check_package_private_access
    }

    /// Inserts a new definition, assigning its uid.
    fn register(&self, mut class: ClassDef, named: bool) -> Rc<ClassDef> {
        let mut classes = self.classes.borrow_mut();
        class.uid = ClassUid::from_idx(classes.len());
        if named {
            self.by_name
                .borrow_mut()
                .insert(class.name.clone(), class.uid);
        }
        let class = Rc::new(class);
        classes.push(class.clone());
        class
    }

    fn cached(&self, name: &str) -> Option<Rc<ClassDef>> {
        let uid = *self.by_name.borrow().get(name)?;
        self.classes.borrow().get(uid.idx()).cloned()
    }

    /// Definition with the given uid.
    pub fn get(&self, uid: ClassUid) -> AnalysisResult<Rc<ClassDef>> {
        self.classes
            .borrow()
            .get(uid.idx())
            .cloned()
            .ok_or_else(|| AnalysisError::Internal(format!("unknown class uid {}", uid.idx())))
    }

    /// Snapshot of the definitions materialized so far.
    pub fn iter_classes(&self) -> impl Iterator<Item = Rc<ClassDef>> {
        self.classes.borrow().clone().into_iter()
    }

    #[inline]
    pub fn object(&self) -> AnalysisResult<Rc<ClassDef>> {
        self.class_def(OBJECT, false)
    }

    /// Distinguished placeholder standing for "some object of an unknown class".
    pub fn unresolved_object(&self) -> AnalysisResult<Rc<ClassDef>> {
        if let Some(uid) = self.unresolved_object.get() {
            return self.get(*uid);
        }
        let class = self.register(self.placeholder(OBJECT)?, false);
        // the cell cannot be set in between: registration does not recurse
        let _ = self.unresolved_object.set(class.uid);
        Ok(class)
    }

    /// Resolves a type descriptor to its class definition, loading or synthesizing it as
    /// needed.
    ///
    /// When `allow_placeholder` is set, an object type that cannot be loaded resolves to
    /// an unresolved placeholder instead of an error.
    pub fn class_def(&self, name: &str, allow_placeholder: bool) -> AnalysisResult<Rc<ClassDef>> {
        if let Some(class) = self.cached(name) {
            return Ok(class);
        }
        if name.starts_with('[') {
            return self.array_class_def(name);
        }
        match self.load_class(name) {
            Ok(class) => Ok(class),
            Err(err) => {
                let err = err.context(format!("Error while loading ClassPath class {name}"));
                if allow_placeholder && name.starts_with('L') {
                    warn!("{err}, using an unresolved placeholder");
                    Ok(self.register(self.placeholder(name)?, true))
                } else {
                    Err(err)
                }
            }
        }
    }

    fn placeholder(&self, name: &str) -> AnalysisResult<ClassDef> {
        let object = self.object()?;
        Ok(ClassDef {
            uid: ClassUid::from_idx(0),
            name: name.to_string(),
            flavor: Flavor::Unresolved,
            superclass: Some(object.uid),
            is_interface: false,
            is_public: true,
            depth: 1,
            implemented_interfaces: BTreeMap::new(),
            interface_table: Vec::new(),
            virtual_methods: Vec::new(),
            vtable: object.vtable.clone(),
            method_lookup: object.method_lookup.clone(),
            instance_fields: object.instance_fields.clone(),
        })
    }

    fn array_class_def(&self, name: &str) -> AnalysisResult<Rc<ClassDef>> {
        let dimensions = name.chars().take_while(|c| *c == '[').count();
        let element_name = &name[dimensions..];
        if dimensions > MAX_ARRAY_DIMENSIONS {
            return Err(AnalysisError::resolution(format!(
                "Error while creating array class for element type {element_name} with {dimensions} dimensions. The maximum number of dimensions is {MAX_ARRAY_DIMENSIONS}"
            )));
        }
        let element = self
            .class_def(element_name, true)
            .map_err(|err| err.context(format!("Error while creating array class {name}")))?;
        let object = self.object()?;
        let mut implemented_interfaces = BTreeMap::new();
        for interface in [CLONEABLE, SERIALIZABLE] {
            let interface = self.class_def(interface, true)?;
            implemented_interfaces.insert(interface.name.clone(), interface.uid);
        }
        Ok(self.register(
            ClassDef {
                uid: ClassUid::from_idx(0),
                name: name.to_string(),
                flavor: Flavor::Array {
                    element: element.uid,
                    dimensions,
                },
                superclass: Some(object.uid),
                is_interface: false,
                is_public: true,
                depth: 1,
                implemented_interfaces,
                interface_table: Vec::new(),
                virtual_methods: Vec::new(),
                vtable: object.vtable.clone(),
                method_lookup: object.method_lookup.clone(),
                instance_fields: object.instance_fields.clone(),
            },
            true,
        ))
    }

    /// Array class of the given element class and dimensions count.
    fn array_of(&self, element: &ClassDef, dimensions: usize) -> AnalysisResult<Rc<ClassDef>> {
        self.class_def(&format!("{}{}", "[".repeat(dimensions), element.name), true)
    }

    fn load_class(&self, name: &str) -> AnalysisResult<Rc<ClassDef>> {
        let info = self.unloaded.borrow_mut().remove(name);
        let info = info.ok_or_else(|| {
            AnalysisError::resolution(format!("Could not find definition for class {name}"))
        })?;
        match self.build_class(&info) {
            Ok(class) => {
                debug!("loaded class {name} from {}", info.source);
                Ok(self.register(class, true))
            }
            Err(err) => {
                let err = err.context(format!(
                    "Error while loading class {name} from file {}",
                    info.source
                ));
                self.unloaded.borrow_mut().insert(name.to_string(), info);
                Err(err)
            }
        }
    }

    fn build_class(&self, info: &ClassInfo) -> AnalysisResult<ClassDef> {
        let superclass = self.load_superclass(info)?;
        let depth = superclass.as_ref().map_or(0, |class| class.depth + 1);
        let implemented_interfaces = self.load_implemented_interfaces(info, superclass.as_deref())?;
        let interface_table = self.load_interface_table(info)?;
        let virtual_methods: Vec<Rc<VirtualMethod>> = info
            .virtual_methods
            .iter()
            .cloned()
            .map(Rc::new)
            .collect();

        let mut vtable = superclass
            .as_ref()
            .map(|class| class.vtable.clone())
            .unwrap_or_default();
        if !info.is_interface {
            self.add_to_vtable(&info.name, &virtual_methods, &mut vtable);
            for interface in &interface_table {
                let interface = self.get(*interface)?;
                self.add_to_vtable(&info.name, &interface.virtual_methods, &mut vtable);
            }
        }

        let mut method_lookup = BTreeMap::new();
        for (idx, method) in vtable.iter().enumerate() {
            method_lookup.insert(method.method.clone(), MethodKind::Virtual(idx));
        }
        for (method, is_static) in &info.direct_methods {
            let kind = if *is_static {
                MethodKind::Static
            } else {
                MethodKind::Direct
            };
            method_lookup.insert(method.clone(), kind);
        }

        let instance_fields = layout_fields(&info.name, &info.instance_fields, superclass.as_deref());

        Ok(ClassDef {
            uid: ClassUid::from_idx(0),
            name: info.name.clone(),
            flavor: Flavor::Regular,
            superclass: superclass.map(|class| class.uid),
            is_interface: info.is_interface,
            is_public: info.is_public,
            depth,
            implemented_interfaces,
            interface_table,
            virtual_methods,
            vtable,
            method_lookup,
            instance_fields,
        })
    }

    fn load_superclass(&self, info: &ClassInfo) -> AnalysisResult<Option<Rc<ClassDef>>> {
        if info.name == OBJECT {
            if let Some(superclass) = &info.superclass {
                return Err(AnalysisError::resolution(format!(
                    "Invalid superclass {superclass} for {OBJECT}. The Object class cannot have a superclass"
                )));
            }
            return Ok(None);
        }
        let name = info
            .superclass
            .as_deref()
            .ok_or_else(|| AnalysisError::resolution(format!("{} has no superclass", info.name)))?;
        let superclass = self
            .class_def(name, true)
            .map_err(|err| err.context(format!("Could not find superclass {name}")))?;

        // placeholders are read as plain public classes here
        if !info.is_interface && superclass.is_interface {
            return Err(AnalysisError::validation(format!(
                "Class {} has the interface {} as its superclass",
                info.name, superclass.name
            )));
        }
        if info.is_interface && !superclass.is_interface && superclass.name != OBJECT {
            return Err(AnalysisError::validation(format!(
                "Interface {} has the non-interface class {} as its superclass",
                info.name, superclass.name
            )));
        }
        Ok(Some(superclass))
    }

    fn load_interface(&self, name: &str) -> AnalysisResult<Rc<ClassDef>> {
        self.class_def(name, true)
            .map_err(|err| err.context(format!("Could not find interface {name}")))
    }

    fn load_implemented_interfaces(
        &self,
        info: &ClassInfo,
        superclass: Option<&ClassDef>,
    ) -> AnalysisResult<BTreeMap<String, ClassUid>> {
        let mut implemented = superclass
            .map(|class| class.implemented_interfaces.clone())
            .unwrap_or_default();
        for name in &info.interfaces {
            let interface = self.load_interface(name)?;
            implemented.insert(interface.name.clone(), interface.uid);
            // super-interfaces are recorded as superclasses of the interface
            let mut current = interface.superclass;
            while let Some(uid) = current {
                let class = self.get(uid)?;
                if class.name == OBJECT {
                    break;
                }
                implemented.insert(class.name.clone(), class.uid);
                current = class.superclass;
            }
        }
        Ok(implemented)
    }

    fn load_interface_table(&self, info: &ClassInfo) -> AnalysisResult<Vec<ClassUid>> {
        let mut table: Vec<ClassUid> = Vec::new();
        for name in &info.interfaces {
            let interface = self.load_interface(name)?;
            if table.contains(&interface.uid) {
                continue;
            }
            table.push(interface.uid);
            for uid in &interface.interface_table {
                if !table.contains(uid) {
                    table.push(*uid);
                }
            }
        }
        Ok(table)
    }

    /// Overrides inherited slots with the given methods, or appends new slots.
    fn add_to_vtable(
        &self,
        class_name: &str,
        methods: &[Rc<VirtualMethod>],
        vtable: &mut Vec<Rc<VirtualMethod>>,
    ) {
        for method in methods {
            let slot = vtable.iter().position(|inherited| {
                inherited.method == method.method
                    && (!self.check_package_private_access || can_access(class_name, inherited))
            });
            match slot {
                Some(idx) => vtable[idx] = method.clone(),
                None => vtable.push(method.clone()),
            }
        }
    }

    /// Checks if `class` is `superclass` or one of its subclasses.
    pub fn extends_class(&self, class: &ClassDef, superclass: &ClassDef) -> AnalysisResult<bool> {
        if class.uid == superclass.uid {
            return Ok(true);
        }
        match class.flavor {
            Flavor::Array {
                element,
                dimensions,
            } => self.array_extends_class(class, element, dimensions, superclass),
            Flavor::Unresolved => {
                if superclass.uid == self.object()?.uid {
                    Ok(true)
                } else {
                    Err(class.unresolved_error())
                }
            }
            Flavor::Regular | Flavor::Primitive => {
                if superclass.is_unresolved() {
                    return Err(superclass.unresolved_error());
                }
                let mut ancestor = self.get(class.uid)?;
                while ancestor.depth > superclass.depth {
                    match ancestor.superclass {
                        Some(uid) => ancestor = self.get(uid)?,
                        None => return Ok(false),
                    }
                }
                Ok(ancestor.uid == superclass.uid)
            }
        }
    }

    fn array_extends_class(
        &self,
        class: &ClassDef,
        element: ClassUid,
        dimensions: usize,
        superclass: &ClassDef,
    ) -> AnalysisResult<bool> {
        let Flavor::Array {
            element: super_element,
            dimensions: super_dimensions,
        } = superclass.flavor
        else {
            if superclass.uid == self.object()?.uid {
                return Ok(true);
            }
            if superclass.is_interface()? {
                return class.implements_interface(superclass);
            }
            return Ok(false);
        };

        let super_element = self.get(super_element)?;
        if dimensions == super_dimensions {
            if super_element.is_interface()? {
                return Ok(true);
            }
            let element = self.get(element)?;
            self.extends_class(&element, &super_element)
        } else if dimensions > super_dimensions {
            // the extra dimensions make the element an array
            Ok(matches!(
                super_element.name.as_str(),
                OBJECT | CLONEABLE | SERIALIZABLE
            ))
        } else {
            Ok(false)
        }
    }

    /// Most specific class both given classes can be assigned to.
    pub fn common_superclass(
        &self,
        first: Option<ClassUid>,
        second: Option<ClassUid>,
    ) -> AnalysisResult<Option<ClassUid>> {
        let (first, second) = match (first, second) {
            (None, other) | (other, None) => return Ok(other),
            (Some(first), Some(second)) => (first, second),
        };
        if first == second {
            return Ok(Some(first));
        }
        let first = self.get(first)?;
        let second = self.get(second)?;
        Ok(Some(self.common_superclass_of(&first, &second)?.uid))
    }

    fn common_superclass_of(
        &self,
        first: &Rc<ClassDef>,
        second: &Rc<ClassDef>,
    ) -> AnalysisResult<Rc<ClassDef>> {
        if first.uid == second.uid {
            return Ok(first.clone());
        }
        if second.is_interface()? {
            if first.implements_interface(second)? {
                return Ok(second.clone());
            }
            return self.object();
        }
        if first.is_interface()? {
            if second.implements_interface(first)? {
                return Ok(first.clone());
            }
            return self.object();
        }
        if let (
            Flavor::Array {
                element: first_element,
                dimensions: first_dimensions,
            },
            Flavor::Array {
                element: second_element,
                dimensions: second_dimensions,
            },
        ) = (first.flavor, second.flavor)
        {
            let first_element = self.get(first_element)?;
            let second_element = self.get(second_element)?;
            if first_element.is_primitive() || second_element.is_primitive() {
                return self.object();
            }
            if first_dimensions == second_dimensions {
                let element = if first_element.is_unresolved() || second_element.is_unresolved() {
                    self.unresolved_object()?
                } else {
                    self.common_superclass_of(&first_element, &second_element)?
                };
                return self.array_of(&element, first_dimensions);
            }
            return self.array_of(&*self.object()?, first_dimensions.min(second_dimensions));
        }

        let mut first_depth = first.depth()?;
        let mut second_depth = second.depth()?;
        let mut first = first.clone();
        let mut second = second.clone();
        while first_depth > second_depth {
            first = self.superclass_of(&first)?;
            first_depth -= 1;
        }
        while second_depth > first_depth {
            second = self.superclass_of(&second)?;
            second_depth -= 1;
        }
        while first_depth > 0 {
            if first.uid == second.uid {
                return Ok(first);
            }
            first = self.superclass_of(&first)?;
            second = self.superclass_of(&second)?;
            first_depth -= 1;
        }
        Ok(first)
    }

    fn superclass_of(&self, class: &ClassDef) -> AnalysisResult<Rc<ClassDef>> {
        match class.superclass {
            Some(uid) => self.get(uid),
            None => self.object(),
        }
    }

    /// Element class of an array class, with one dimension removed.
    pub fn immediate_element_class(&self, class: &ClassDef) -> AnalysisResult<Option<Rc<ClassDef>>> {
        match class.flavor {
            Flavor::Array {
                element,
                dimensions: 1,
            } => Ok(Some(self.get(element)?)),
            Flavor::Array {
                element,
                dimensions,
            } => {
                let element = self.get(element)?;
                Ok(Some(self.array_of(&element, dimensions - 1)?))
            }
            _ => Ok(None),
        }
    }

    /// Innermost element class of an array class.
    pub fn base_element_class(&self, class: &ClassDef) -> AnalysisResult<Option<Rc<ClassDef>>> {
        class
            .base_element_class()
            .map(|uid| self.get(uid))
            .transpose()
    }
}

/// Package of a class descriptor, empty for the default package.
pub(crate) fn package_of(class_name: &str) -> &str {
    match class_name.rfind('/') {
        Some(idx) if idx > 0 => &class_name[1..idx],
        _ => "",
    }
}

fn can_access(class_name: &str, method: &VirtualMethod) -> bool {
    !method.is_package_private || package_of(&method.containing_class) == package_of(class_name)
}

/// Owner of the class path of an analysis, which can only be installed once.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    class_path: OnceCell<ClassPath>,
}

impl AnalysisSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, class_path: ClassPath) -> AnalysisResult<&ClassPath> {
        if self.class_path.set(class_path).is_err() {
            return Err(AnalysisError::config(
                "Cannot initialize ClassPath multiple times",
            ));
        }
        self.class_path()
    }

    pub fn class_path(&self) -> AnalysisResult<&ClassPath> {
        self.class_path
            .get()
            .ok_or_else(|| AnalysisError::config("The class path has not been initialized"))
    }
}
