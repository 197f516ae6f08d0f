mod common;

use common::{Class, OBJECT};
use dz_analysis::analyzer::{AnalysisState, InstructionState, MethodAnalyzer};
use dz_analysis::classpath::ClassPath;
use dz_analysis::deodex::{DeodexUtil, InlineMethodResolver};
use dz_analysis::register_type::Category;
use dz_dex::code::CodeItem;
use dz_dex::instrs::Instr;
use dz_dex::registers::{Reg, RegList};
use dz_dex::{Dex, DexIndex};

const COUNTER: &str = "Lcom/app/Counter;";

fn r(n: u8) -> Reg {
    Reg::from(n)
}

fn counter() -> Dex {
    let mut dex = Dex::new_odex(vec!["/system/framework/core.odex".to_string()]);
    Class::new(COUNTER)
        .field("count", "I")
        .virtual_(
            "get()I",
            Some(CodeItem::new(
                2,
                1,
                vec![Instr::IgetQuick(r(0), r(1), 8), Instr::Return(r(0))],
            )),
        )
        .virtual_(
            "call()V",
            Some(CodeItem::new(
                2,
                1,
                vec![
                    Instr::InvokeVirtualQuick(RegList::from(vec![1u8]), 3),
                    Instr::ReturnVoid,
                ],
            )),
        )
        .add_to(&mut dex);
    dex
}

#[test]
fn quick_field_access() {
    common::init_logger();
    let core = common::core_container();
    let mut dex = counter();
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();
    let method = common::find_method(&dex, COUNTER, "get");

    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    assert_eq!(analyzer.analysis_state(), AnalysisState::Verified);
    assert_eq!(analyzer.deodexed_count(), 1);

    let first = &analyzer.instructions()[0];
    assert!(matches!(first.original_instruction(), Instr::IgetQuick(..)));
    assert_eq!(first.state(), InstructionState::Deodexed);
    let Instr::Iget(dest, object, field) = first.instruction() else {
        panic!("expected an iget");
    };
    assert_eq!((dest.value(), object.value()), (0, 1));
    let field = field.get(&dex).unwrap();
    assert_eq!(field.class_descriptor(&dex).unwrap(), COUNTER);
    assert_eq!(field.name(), "count");
    assert_eq!(first.post_register(r(0)).unwrap().category(), Category::Integer);

    analyzer.write_back(&mut dex).unwrap();
    let method = common::find_method(&dex, COUNTER, "get");
    let mut again = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    again.analyze(&mut dex).unwrap();
    again.verify(&dex).unwrap();
    assert_eq!(again.deodexed_count(), 0);
}

#[test]
fn quick_virtual_call() {
    let core = common::core_container();
    let mut dex = counter();
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();
    let method = common::find_method(&dex, COUNTER, "call");

    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    let Instr::InvokeVirtual(args, target) = analyzer.instructions()[0].instruction() else {
        panic!("expected an invoke-virtual");
    };
    assert_eq!(args.len(), 1);
    // slots 0 to 2 belong to the root class
    assert_eq!(
        target.get(&dex).unwrap().full_string(&dex).unwrap(),
        "Lcom/app/Counter;->get()I"
    );
}

#[test]
fn inherited_vtable_slot() {
    let core = common::core_container();
    let mut dex = counter();
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();

    let accessing = class_path.class_def(COUNTER, false).unwrap();
    let target = deodex
        .lookup_virtual_method(&class_path, &mut dex, &accessing, &accessing, 0)
        .unwrap()
        .unwrap();
    assert_eq!(
        target.get(&dex).unwrap().full_string(&dex).unwrap(),
        format!("{OBJECT}->toString()Ljava/lang/String;")
    );
    assert!(deodex
        .lookup_virtual_method(&class_path, &mut dex, &accessing, &accessing, 42)
        .unwrap()
        .is_none());
    assert!(deodex
        .lookup_field(&class_path, &mut dex, &accessing, &accessing, 12)
        .unwrap()
        .is_none());
}

#[test]
fn inline_tables() {
    let v35 = InlineMethodResolver::for_version(35).unwrap();
    let empty = v35.resolve(0, 0).unwrap();
    assert_eq!(empty.name(), "emptyInlineMethod");
    assert_eq!(empty.class(), "Lorg/apache/harmony/dalvik/NativeTestTarget;");
    assert_eq!(v35.resolve(4, 1).unwrap().to_string(), "Ljava/lang/String;->length()I");
    assert!(v35.resolve(500, 0).is_err());

    // the ambiguous slots of version 36 depend on the number of arguments
    let v36 = InlineMethodResolver::for_version(36).unwrap();
    assert_eq!(v36.resolve(5, 1).unwrap().name(), "isEmpty");
    assert_eq!(v36.resolve(5, 3).unwrap().name(), "indexOf");
    assert!(v36.resolve(5, 2).is_err());

    let err = InlineMethodResolver::for_version(34).unwrap_err();
    assert_eq!(err.to_string(), "odex version 34 is not supported yet");
}

const ACTIVITY: &str = "Landroid/app/Activity;";
const ACT: &str = "Lcom/app/Act;";

/// An application class whose superclass is missing from the class path.
fn act() -> Dex {
    let mut dex = Dex::new_odex(vec!["/system/framework/core.odex".to_string()]);
    Class::new(ACT)
        .extends(Some(ACTIVITY))
        .field("state", "I")
        .virtual_(
            "state()I",
            Some(CodeItem::new(
                2,
                1,
                vec![Instr::IgetQuick(r(0), r(1), 8), Instr::Return(r(0))],
            )),
        )
        .virtual_(
            "describe()V",
            Some(CodeItem::new(
                1,
                1,
                vec![
                    Instr::InvokeVirtualQuick(RegList::from(vec![0u8]), 0),
                    Instr::ReturnVoid,
                ],
            )),
        )
        .add_to(&mut dex);
    dex
}

#[test]
fn missing_superclass_keeps_own_fields() {
    common::init_logger();
    let core = common::core_container();
    let mut dex = act();
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();

    let class = class_path.class_def(ACT, false).unwrap();
    assert!(!class.is_unresolved());
    assert_eq!(class.depth().unwrap(), 2);
    let superclass = class_path.get(class.superclass().unwrap()).unwrap();
    assert!(superclass.is_unresolved());

    let method = common::find_method(&dex, ACT, "state");
    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    let Instr::Iget(_, _, field) = analyzer.instructions()[0].instruction() else {
        panic!("expected an iget");
    };
    let field = field.get(&dex).unwrap();
    assert_eq!(field.class_descriptor(&dex).unwrap(), ACT);
    assert_eq!(field.name(), "state");
}

#[test]
fn existing_reference_on_placeholder_is_used() {
    let core = common::core_container();
    let mut dex = act();
    common::method_ref(&mut dex, ACTIVITY, "toString()Ljava/lang/String;");
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();
    let method = common::find_method(&dex, ACT, "describe");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, Some(&deodex)).unwrap();
    analyzer.analyze(&mut dex).unwrap();
    let Instr::InvokeVirtual(_, target) = analyzer.instructions()[0].instruction() else {
        panic!("expected an invoke-virtual");
    };
    // the placeholder sits in another package but counts as public
    assert_eq!(
        target.get(&dex).unwrap().full_string(&dex).unwrap(),
        format!("{ACTIVITY}->toString()Ljava/lang/String;")
    );
}

#[test]
fn quick_accesses_on_null_are_unresolvable() {
    let core = common::core_container();
    let mut dex = counter();
    Class::new("Lcom/app/Broken;")
        .virtual_(
            "read()I",
            Some(CodeItem::new(
                3,
                1,
                vec![
                    Instr::Const4(r(0), 0),
                    Instr::IgetQuick(r(1), r(0), 8),
                    Instr::Return(r(1)),
                ],
            )),
        )
        .virtual_(
            "call()V",
            Some(CodeItem::new(
                2,
                1,
                vec![
                    Instr::Const4(r(0), 0),
                    Instr::InvokeVirtualQuick(RegList::from(vec![0u8]), 3),
                    Instr::ReturnVoid,
                ],
            )),
        )
        .add_to(&mut dex);
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();

    let method = common::find_method(&dex, "Lcom/app/Broken;", "read");
    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    let unresolved = &analyzer.instructions()[1];
    let Instr::UnresolvedOdex(original, object) = unresolved.instruction() else {
        panic!("expected an unresolved odex instruction");
    };
    assert!(matches!(**original, Instr::IgetQuick(..)));
    assert_eq!(object.value(), 0);
    assert_eq!(unresolved.state(), InstructionState::Deodexed);
    assert!(!unresolved.is_dead());
    // the return reads a register the access never set
    assert!(analyzer.instructions()[2].is_dead());

    let method = common::find_method(&dex, "Lcom/app/Broken;", "call");
    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    assert!(matches!(
        analyzer.instructions()[1].instruction(),
        Instr::UnresolvedOdex(original, _) if matches!(**original, Instr::InvokeVirtualQuick(..))
    ));
    assert!(analyzer.instructions()[2].is_dead());
}

#[test]
fn quick_super_call() {
    let core = common::core_container();
    let mut dex = Dex::new_odex(vec!["/system/framework/core.odex".to_string()]);
    Class::new("Lcom/app/Base;")
        .virtual_("greet()V", None)
        .add_to(&mut dex);
    Class::new("Lcom/app/Child;")
        .extends(Some("Lcom/app/Base;"))
        .virtual_(
            "greet()V",
            Some(CodeItem::new(
                1,
                1,
                vec![
                    Instr::InvokeSuperQuick(RegList::from(vec![0u8]), 3),
                    Instr::ReturnVoid,
                ],
            )),
        )
        .add_to(&mut dex);
    let class_path = ClassPath::from_containers([("core.odex", &core), ("app.odex", &dex)], false).unwrap();
    let deodex = DeodexUtil::for_odex_version(35).unwrap();
    let method = common::find_method(&dex, "Lcom/app/Child;", "greet");

    let analyzer = dz_analysis::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    let first = &analyzer.instructions()[0];
    assert!(matches!(first.original_instruction(), Instr::InvokeSuperQuick(..)));
    assert_eq!(first.state(), InstructionState::Deodexed);
    let Instr::InvokeSuper(_, target) = first.instruction() else {
        panic!("expected an invoke-super");
    };
    // slot 3 of the superclass, not the overriding method
    assert_eq!(
        target.get(&dex).unwrap().full_string(&dex).unwrap(),
        "Lcom/app/Base;->greet()V"
    );
}
