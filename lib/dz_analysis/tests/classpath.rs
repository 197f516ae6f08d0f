mod common;

use common::{Class, OBJECT, STRING};
use dz_analysis::classpath::{AnalysisSession, ClassPath, MethodKind};
use dz_analysis::config::ClassPathConfig;
use dz_analysis::errors::AnalysisError;
use dz_dex::classes::ClassFlags;
use dz_dex::{Dex, JsonLoader};

fn app() -> Dex {
    let mut dex = Dex::new();
    Class::new("Lcom/app/Shape;")
        .field("name", STRING)
        .virtual_("area()D", None)
        .add_to(&mut dex);
    Class::new("Lcom/app/Circle;")
        .extends(Some("Lcom/app/Shape;"))
        .field("radius", "D")
        .virtual_("area()D", None)
        .add_to(&mut dex);
    Class::new("Lcom/app/Square;")
        .extends(Some("Lcom/app/Shape;"))
        .virtual_("side()I", None)
        .add_to(&mut dex);
    dex
}

#[test]
fn boot_entry_found_through_extension_fallback() {
    common::init_logger();
    let dir = tempfile::tempdir().unwrap();
    common::write_core(dir.path(), "core.odex");
    let config = ClassPathConfig::new()
        .with_dir(dir.path())
        .with_boot_entry("core.jar");

    let dex = app();
    let class_path = ClassPath::initialize(&config, "app.json", &dex, &JsonLoader).unwrap();
    let string = class_path.class_def(STRING, false).unwrap();
    assert!(string.has_virtual_method("length()I").unwrap());

    let circle = class_path.class_def("Lcom/app/Circle;", false).unwrap();
    let square = class_path.class_def("Lcom/app/Square;", false).unwrap();
    let shape = class_path.class_def("Lcom/app/Shape;", false).unwrap();
    assert_eq!(circle.depth().unwrap(), 2);
    assert!(class_path.extends_class(&circle, &shape).unwrap());
    assert!(!class_path.extends_class(&shape, &circle).unwrap());
    assert_eq!(
        class_path
            .common_superclass(Some(circle.uid()), Some(square.uid()))
            .unwrap(),
        Some(shape.uid())
    );
}

#[test]
fn missing_boot_entry() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClassPathConfig::new()
        .with_dir(dir.path())
        .with_boot_entry("framework.jar");

    let err = ClassPath::initialize(&config, "app.json", &app(), &JsonLoader).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
    assert_eq!(err.to_string(), "Cannot locate boot class path file framework.jar");
}

#[test]
fn empty_file_is_skipped() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    dz_dex::save(&Dex::new(), first.path().join("core.jar")).unwrap();
    common::write_core(second.path(), "core.jar");
    let config = ClassPathConfig::new()
        .with_dir(first.path())
        .with_dir(second.path())
        .with_boot_entry("core.jar");

    let class_path = ClassPath::initialize(&config, "app.json", &app(), &JsonLoader).unwrap();
    assert!(class_path.class_def(STRING, false).is_ok());
}

#[test]
fn extra_entries_after_boot_entries() {
    let dir = tempfile::tempdir().unwrap();
    common::write_core(dir.path(), "core.jar");
    let mut services = Dex::new();
    Class::new("Lcom/android/server/Service;").add_to(&mut services);
    dz_dex::save(&services, dir.path().join("services.jar")).unwrap();
    let config = ClassPathConfig::new()
        .with_dir(dir.path())
        .with_boot_entry("core.jar")
        .with_extra_entry("services.jar")
        .with_package_private_access_check(true);

    let class_path = ClassPath::initialize(&config, "app.json", &app(), &JsonLoader).unwrap();
    assert!(class_path.checks_package_private_access());
    let service = class_path.class_def("Lcom/android/server/Service;", false).unwrap();
    assert!(!service.is_unresolved());
}

#[test]
fn boot_entries_from_odex_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    common::write_core(dir.path(), "core.odex");
    let config = ClassPathConfig::new().with_dir(dir.path());

    let mut odex = Dex::new_odex(vec!["/data/dalvik-cache/system@framework@core.jar@classes.dex".to_string()]);
    Class::new("Lcom/app/Main;").add_to(&mut odex);
    let class_path = ClassPath::initialize_from_odex(&config, "app.odex", &odex, &JsonLoader).unwrap();
    assert!(class_path.class_def("Lcom/app/Main;", false).is_ok());

    let err = ClassPath::initialize_from_odex(&config, "app.json", &app(), &JsonLoader).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}

#[test]
fn first_definition_wins() {
    let boot = common::core_container();
    let mut shadow = Dex::new();
    Class::new(STRING).virtual_("isShadow()Z", None).add_to(&mut shadow);

    let class_path = ClassPath::from_containers([("boot", &boot), ("app", &shadow)], false).unwrap();
    let string = class_path.class_def(STRING, false).unwrap();
    assert!(!string.has_virtual_method("isShadow()Z").unwrap());
}

#[test]
fn vtable_override_and_lookup() {
    let boot = common::core_container();
    let dex = app();
    let class_path = ClassPath::from_containers([("boot", &boot), ("app", &dex)], false).unwrap();

    let shape = class_path.class_def("Lcom/app/Shape;", false).unwrap();
    let circle = class_path.class_def("Lcom/app/Circle;", false).unwrap();
    let Some(MethodKind::Virtual(slot)) = shape.method_type("area()D") else {
        panic!("area is virtual");
    };
    assert_eq!(circle.method_type("area()D"), Some(MethodKind::Virtual(slot)));
    assert_eq!(circle.vtable().len(), shape.vtable().len());
    assert_eq!(circle.vtable()[slot].containing_class, "Lcom/app/Circle;");
    assert_eq!(shape.vtable()[slot].containing_class, "Lcom/app/Shape;");
    assert_eq!(circle.virtual_method(0).unwrap().containing_class, OBJECT);

    // references first, then wide values
    let fields: Vec<(usize, String)> = circle
        .iter_instance_fields()
        .map(|(offset, field)| (offset, field.name.clone()))
        .collect();
    assert_eq!(fields, vec![(8, "name".to_string()), (16, "radius".to_string())]);
}

#[test]
fn class_cannot_extend_interface() {
    let boot = common::core_container();
    let mut dex = Dex::new();
    Class::new("Lcom/app/Marker;")
        .flags(ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT)
        .add_to(&mut dex);
    Class::new("Lcom/app/Broken;")
        .extends(Some("Lcom/app/Marker;"))
        .add_to(&mut dex);
    let class_path = ClassPath::from_containers([("boot", &boot), ("app", &dex)], false).unwrap();

    let err = class_path.class_def("Lcom/app/Broken;", false).unwrap_err();
    assert!(err
        .to_string()
        .contains("Class Lcom/app/Broken; has the interface Lcom/app/Marker; as its superclass"));

    // placeholders are only handed out on request
    let placeholder = class_path.class_def("Lcom/app/Broken;", true).unwrap();
    assert!(placeholder.is_unresolved());
}

#[test]
fn session_installs_once() {
    let boot = common::core_container();
    let session = AnalysisSession::new();
    assert!(session.class_path().is_err());

    let class_path = ClassPath::from_containers([("boot", &boot)], false).unwrap();
    session.install(class_path).unwrap();
    assert!(session.class_path().unwrap().class_def(STRING, false).is_ok());

    let again = ClassPath::from_containers([("boot", &boot)], false).unwrap();
    let err = session.install(again).unwrap_err();
    assert_eq!(err.to_string(), "Cannot initialize ClassPath multiple times");
}
