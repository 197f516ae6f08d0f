use super::*;
use crate::testing::{self, ClassBuilder};
use dz_dex::code::{CodeItem, TryItem};
use dz_dex::registers::RegList;
use dz_dex::DexIndex;

const MAIN: &str = "Lcom/app/Main;";

fn r(n: u8) -> Reg {
    Reg::from(n)
}

fn static_flags() -> MethodFlags {
    MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC
}

/// Adds a `Lcom/app/Main;` class holding a single static method.
fn with_method(dex: &mut Dex, signature: &str, code: CodeItem) {
    ClassBuilder::new(MAIN)
        .direct_method(signature, static_flags(), Some(code))
        .build(dex);
}

fn find_method(dex: &Dex, name: &str) -> EncodedMethod {
    dex.find_class_def(MAIN)
        .and_then(|class| class.class_data())
        .and_then(|data| {
            data.iter_methods()
                .find(|method| method.descriptor(dex).unwrap().name() == name)
        })
        .cloned()
        .unwrap()
}

fn node_at(analyzer: &MethodAnalyzer, addr: usize) -> AnalyzedInstruction {
    analyzer.instruction_at_address(Addr(addr)).unwrap().clone()
}

#[test]
fn literal_and_arithmetic_types() {
    let mut dex = Dex::new();
    let code = CodeItem::new(
        2,
        0,
        vec![
            Instr::Const4(r(0), 1),
            Instr::Const16(r(1), 300),
            Instr::AddInt2addr(r(0), r(1)),
            Instr::Return(r(0)),
        ],
    );
    with_method(&mut dex, "sum()I", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "sum");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    assert_eq!(analyzer.analysis_state(), AnalysisState::NotAnalyzed);
    analyzer.analyze(&mut dex).unwrap();
    assert_eq!(analyzer.analysis_state(), AnalysisState::Analyzed);

    let const4 = node_at(&analyzer, 0);
    assert_eq!(const4.post_register(r(0)).unwrap().category(), Category::One);
    assert_eq!(const4.post_register(r(1)).unwrap().category(), Category::Uninit);
    let const16 = node_at(&analyzer, 1);
    assert_eq!(const16.post_register(r(1)).unwrap().category(), Category::PosShort);
    let ret = node_at(&analyzer, 4);
    assert_eq!(ret.pre_register(r(0)).unwrap().category(), Category::Integer);

    analyzer.verify(&dex).unwrap();
    assert_eq!(analyzer.analysis_state(), AnalysisState::Verified);
    assert!(analyzer.validation_error().is_none());
}

#[test]
fn wide_constant_sets_both_halves() {
    let mut dex = Dex::new();
    let code = CodeItem::new(
        2,
        0,
        vec![Instr::ConstWide16(r(0), 5), Instr::ReturnWide(r(0))],
    );
    with_method(&mut dex, "wide()J", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "wide");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    let ret = node_at(&analyzer, 2);
    assert_eq!(ret.pre_register(r(0)).unwrap().category(), Category::LongLo);
    assert_eq!(ret.pre_register(r(1)).unwrap().category(), Category::LongHi);
}

#[test]
fn loop_reaches_fixed_point() {
    let mut dex = Dex::new();
    // v1 is the parameter
    let code = CodeItem::new(
        2,
        1,
        vec![
            Instr::Const4(r(0), 0),            // 0x0
            Instr::IfLez(r(1), 6),             // 0x1
            Instr::AddInt2addr(r(0), r(1)),    // 0x3
            Instr::AddIntLit8(r(1), r(1), -1), // 0x4
            Instr::Goto(-5),                   // 0x6
            Instr::Return(r(0)),               // 0x7
        ],
    );
    with_method(&mut dex, "total(I)I", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "total");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    let test = node_at(&analyzer, 1);
    assert_eq!(test.pre_register(r(0)).unwrap().category(), Category::Integer);
    assert_eq!(test.predecessors().count(), 2);
    let ret = node_at(&analyzer, 7);
    assert_eq!(ret.pre_register(r(0)).unwrap().category(), Category::Integer);
    assert_eq!(ret.pre_register(r(1)).unwrap().category(), Category::Integer);
    assert!(analyzer.instructions().iter().all(|instr| !instr.is_dead()));
}

#[test]
fn flow_graph_edges() {
    let mut dex = Dex::new();
    let code = CodeItem::new(
        1,
        0,
        vec![
            Instr::Const4(r(0), 0),  // 0x0
            Instr::IfEqz(r(0), 3),   // 0x1
            Instr::Nop,              // 0x3
            Instr::ReturnVoid,       // 0x4
            Instr::ReturnVoid,       // 0x5
        ],
    );
    with_method(&mut dex, "branch()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "branch");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    let test = node_at(&analyzer, 1);
    assert_eq!(test.successors(), &[3, 4]);
    let ret = node_at(&analyzer, 4);
    assert_eq!(ret.predecessors().collect::<Vec<_>>(), vec![2, 3]);

    analyzer.analyze(&mut dex).unwrap();
    assert!(!node_at(&analyzer, 4).is_dead());
    assert!(node_at(&analyzer, 5).is_dead());

    let dot = analyzer.to_dot(&dex);
    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains("start"));
    assert!(dot.contains("<jmp>"));
    assert!(dot.contains("shape=box,color=gray"));
}

#[test]
fn exception_handler_edges() {
    let mut dex = Dex::new();
    let hello = dex.intern_string("hello");
    let exception = dex.intern_type("Ljava/lang/Exception;");
    let code = CodeItem::new(
        2,
        0,
        vec![
            Instr::ConstString(r(0), hello), // 0x0
            Instr::ReturnVoid,               // 0x2
            Instr::MoveException(r(1)),      // 0x3
            Instr::ReturnVoid,               // 0x4
        ],
    )
    .with_try(TryItem::new(Addr(0), 2).with_handler(exception, Addr(3)));
    with_method(&mut dex, "guarded()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "guarded");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    let handler = node_at(&analyzer, 3);
    assert_eq!(handler.predecessors().collect::<Vec<_>>(), vec![0]);

    let caught = handler.post_register(r(1)).unwrap();
    assert_eq!(caught.category(), Category::Reference);
    assert_eq!(
        caught.display(&class_path).to_string(),
        RegisterType::for_type("Ljava/lang/Exception;", &class_path)
            .unwrap()
            .display(&class_path)
            .to_string()
    );

    let catches = analyzer
        .graph()
        .edge_weights()
        .filter(|branch| matches!(branch, Branch::Catch(typ) if typ == "Ljava/lang/Exception;"))
        .count();
    assert_eq!(catches, 1);
}

#[test]
fn move_exception_reached_by_sequence() {
    let mut dex = Dex::new();
    let code = CodeItem::new(1, 0, vec![Instr::Nop, Instr::MoveException(r(0)), Instr::ReturnVoid]);
    with_method(&mut dex, "fallthrough()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "fallthrough");

    let err = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap_err();
    let AnalysisError::Validation(err) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(
        err.message(),
        "Execution can pass from the nop instruction at code address 0x0 to the move-exception instruction at address 0x1"
    );
    assert_eq!(err.code_address, Some(Addr(0)));
}

#[test]
fn move_exception_at_method_start() {
    let mut dex = Dex::new();
    let code = CodeItem::new(1, 0, vec![Instr::MoveException(r(0)), Instr::ReturnVoid]);
    with_method(&mut dex, "start()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "start");

    let err = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Execution can pass from the start of the method to the move-exception"));
}

#[test]
fn execution_past_last_instruction() {
    let mut dex = Dex::new();
    let code = CodeItem::new(1, 0, vec![Instr::Const4(r(0), 0)]);
    with_method(&mut dex, "open()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "open");

    let err = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap_err();
    assert!(err.is_validation());
    assert!(err
        .to_string()
        .starts_with("Execution can continue past the last instruction"));
}

#[test]
fn method_without_code() {
    let mut dex = Dex::new();
    ClassBuilder::new(MAIN)
        .direct_method("native()V", static_flags() | MethodFlags::ACC_NATIVE, None)
        .build(&mut dex);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "native");

    let err = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap_err();
    assert_eq!(err.to_string(), "The method has no code");
}

#[test]
fn constructor_call_initializes_reference() {
    let mut dex = Dex::new();
    let object = dex.intern_type("Ljava/lang/Object;");
    let init = testing::method_ref(&mut dex, "Ljava/lang/Object;", "<init>()V");
    let code = CodeItem::new(
        1,
        0,
        vec![
            Instr::NewInstance(r(0), object),                 // 0x0
            Instr::InvokeDirect(RegList::from(vec![0u8]), init), // 0x2
            Instr::ReturnObject(r(0)),                        // 0x5
        ],
    );
    with_method(&mut dex, "make()Ljava/lang/Object;", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "make");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    let created = node_at(&analyzer, 0).post_register(r(0)).unwrap();
    assert_eq!(created.category(), Category::UninitRef);
    let ret = node_at(&analyzer, 5).pre_register(r(0)).unwrap();
    assert_eq!(ret.category(), Category::Reference);
    assert_eq!(ret.class(), Some(class_path.object().unwrap().uid()));
}

#[test]
fn uninitialized_reference_method_call() {
    let mut dex = Dex::new();
    let string = dex.intern_type("Ljava/lang/String;");
    let length = testing::method_ref(&mut dex, "Ljava/lang/String;", "length()I");
    let code = CodeItem::new(
        1,
        0,
        vec![
            Instr::NewInstance(r(0), string),
            Instr::InvokeVirtual(RegList::from(vec![0u8]), length),
            Instr::ReturnVoid,
        ],
    );
    with_method(&mut dex, "early()V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "early");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    analyzer.analyze(&mut dex).unwrap();
    let err = analyzer.verify(&dex).unwrap_err();
    assert!(err.to_string().starts_with(
        "Cannot invoke non-<init> method Ljava/lang/String;->length()I on uninitialized reference type Ljava/lang/String;"
    ));
}

#[test]
fn verification_error_context() {
    let mut dex = Dex::new();
    let hello = dex.intern_string("hello");
    let code = CodeItem::new(
        1,
        0,
        vec![Instr::ConstString(r(0), hello), Instr::Return(r(0))],
    );
    with_method(&mut dex, "bad()I", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "bad");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    analyzer.analyze(&mut dex).unwrap();
    let err = analyzer.verify(&dex).unwrap_err();
    let AnalysisError::Validation(err) = err else {
        panic!("expected a validation error");
    };
    assert!(err.message().starts_with("Invalid register type"));
    assert!(err.message().ends_with("for register v0."));
    assert_eq!(err.code_address, Some(Addr(2)));
    assert_eq!(err.opcode.as_deref(), Some("return"));
    assert_eq!(err.method.as_deref(), Some("Lcom/app/Main;->bad()I"));
    assert_eq!(analyzer.validation_error(), Some(&err));
    assert_eq!(analyzer.analysis_state(), AnalysisState::Analyzed);
}

#[test]
fn return_type_mismatch() {
    let mut dex = Dex::new();
    let code = CodeItem::new(1, 0, vec![Instr::Const4(r(0), 0), Instr::ReturnVoid]);
    with_method(&mut dex, "value()I", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "value");

    let err = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Cannot use return-void with a non-void return type (I)"));
}

#[test]
fn verify_needs_analysis() {
    let mut dex = Dex::new();
    with_method(&mut dex, "empty()V", CodeItem::new(0, 0, vec![Instr::ReturnVoid]));
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "empty");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    let err = analyzer.verify(&dex).unwrap_err();
    assert!(matches!(err, AnalysisError::Internal(_)));
}

#[test]
fn return_void_barrier_is_deodexed() {
    let mut dex = Dex::new_odex(Vec::new());
    with_method(&mut dex, "barrier()V", CodeItem::new(0, 0, vec![Instr::ReturnVoidBarrier]));
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "barrier");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    assert_eq!(analyzer.deodexed_count(), 1);
    assert!(matches!(analyzer.deodexed_instructions().as_slice(), [Instr::ReturnVoid]));
    assert!(matches!(
        analyzer.instructions()[0].original_instruction(),
        Instr::ReturnVoidBarrier
    ));
    assert_eq!(analyzer.instructions()[0].state(), InstructionState::Deodexed);
}

#[test]
fn execute_inline_is_deodexed() {
    let mut dex = Dex::new_odex(Vec::new());
    // v1 is the parameter, inline method 4 is String.length()
    let code = CodeItem::new(
        2,
        1,
        vec![
            Instr::ExecuteInline(RegList::from(vec![1u8]), 4),
            Instr::MoveResult(r(0)),
            Instr::Return(r(0)),
        ],
    );
    with_method(&mut dex, "size(Ljava/lang/String;)I", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "size");
    let deodex = DeodexUtil::for_odex_version(35).unwrap();

    let mut analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, Some(&deodex)).unwrap();
    assert_eq!(analyzer.deodexed_count(), 1);
    let Instr::InvokeVirtual(args, idx) = analyzer.instructions()[0].instruction() else {
        panic!("expected an invoke-virtual");
    };
    assert_eq!(args.len(), 1);
    assert_eq!(
        idx.get(&dex).unwrap().full_string(&dex).unwrap(),
        "Ljava/lang/String;->length()I"
    );
    let ret = node_at(&analyzer, 4).pre_register(r(0)).unwrap();
    assert_eq!(ret.category(), Category::Integer);

    analyzer.write_back(&mut dex).unwrap();
    let method = find_method(&dex, "size");
    let first = method.code().unwrap().iter_instructions().next().unwrap().clone();
    assert!(matches!(first, Instr::InvokeVirtual(..)));
    // analyzing twice is a no-op
    analyzer.analyze(&mut dex).unwrap();
}

#[test]
fn odexed_instruction_without_deodex_support() {
    let mut dex = Dex::new_odex(Vec::new());
    let code = CodeItem::new(
        2,
        1,
        vec![
            Instr::ExecuteInline(RegList::from(vec![1u8]), 4),
            Instr::ReturnVoid,
        ],
    );
    with_method(&mut dex, "inline(Ljava/lang/String;)V", code);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "inline");

    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    let err = analyzer.analyze(&mut dex).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Cannot analyze an odexed instruction unless we are deodexing"));
    assert!(analyzer.validation_error().is_some());
}

#[test]
fn parameters_and_this_at_entry() {
    let mut dex = Dex::new();
    ClassBuilder::new(MAIN)
        .virtual_method(
            "mix(JLjava/lang/String;)V",
            MethodFlags::ACC_PUBLIC,
            Some(CodeItem::new(5, 4, vec![Instr::ReturnVoid])),
        )
        .build(&mut dex);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "mix");

    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    let entry = analyzer.start();
    let categories: Vec<Category> = entry
        .post_registers()
        .iter()
        .map(|typ| typ.category())
        .collect();
    assert_eq!(
        categories,
        vec![
            Category::Uninit,
            Category::Reference,
            Category::LongLo,
            Category::LongHi,
            Category::Reference,
        ]
    );
    let main = class_path.class_def(MAIN, false).unwrap();
    assert_eq!(entry.post_registers()[1].class(), Some(main.uid()));
}

#[test]
fn static_field_types() {
    let mut dex = Dex::new();
    let counter = dex.intern_field_ref(MAIN, "counter", "I");
    let total = dex.intern_field_ref(MAIN, "total", "J");
    ClassBuilder::new(MAIN)
        .static_field("counter", "I")
        .static_field("total", "J")
        .direct_method(
            "bump()V",
            static_flags(),
            Some(CodeItem::new(
                1,
                0,
                vec![
                    Instr::Sget(r(0), counter),
                    Instr::AddIntLit8(r(0), r(0), 1),
                    Instr::Sput(r(0), counter),
                    Instr::ReturnVoid,
                ],
            )),
        )
        .direct_method(
            "narrow()I",
            static_flags(),
            Some(CodeItem::new(1, 0, vec![Instr::Sget(r(0), total), Instr::Return(r(0))])),
        )
        .build(&mut dex);
    let class_path = testing::class_path_with(&dex);

    let method = find_method(&dex, "bump");
    crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();

    let method = find_method(&dex, "narrow");
    let mut analyzer = MethodAnalyzer::new(&class_path, &dex, &method, None).unwrap();
    analyzer.analyze(&mut dex).unwrap();
    let err = analyzer.verify(&dex).unwrap_err();
    let message = &analyzer.validation_error().unwrap().message;
    assert!(message.starts_with("Cannot use sget with field"));
    assert!(message.ends_with("Incorrect field type for the instruction."));
    assert!(err.is_validation());
}

#[test]
fn volatile_accesses_are_deodexed() {
    let mut dex = Dex::new_odex(Vec::new());
    let counter = dex.intern_field_ref(MAIN, "counter", "I");
    let total = dex.intern_field_ref(MAIN, "total", "J");
    let last = dex.intern_field_ref(MAIN, "last", "Ljava/lang/Object;");
    // v3 is this
    let code = CodeItem::new(
        4,
        1,
        vec![
            Instr::IgetVolatile(r(0), r(3), counter),
            Instr::IputVolatile(r(0), r(3), counter),
            Instr::SgetWideVolatile(r(1), total),
            Instr::SputObjectVolatile(r(3), last),
            Instr::ReturnVoid,
        ],
    );
    ClassBuilder::new(MAIN)
        .field("counter", "I")
        .static_field("total", "J")
        .static_field("last", "Ljava/lang/Object;")
        .virtual_method("touch()V", MethodFlags::ACC_PUBLIC, Some(code))
        .build(&mut dex);
    let class_path = testing::class_path_with(&dex);
    let method = find_method(&dex, "touch");

    // no odex support needed, the field reference is kept
    let analyzer = crate::analyze_and_verify(&class_path, &mut dex, &method, None).unwrap();
    assert_eq!(analyzer.deodexed_count(), 4);
    assert!(matches!(
        analyzer.deodexed_instructions().as_slice(),
        [
            Instr::Iget(_, _, a),
            Instr::Iput(_, _, b),
            Instr::SgetWide(_, c),
            Instr::SputObject(_, d),
            Instr::ReturnVoid,
        ] if *a == counter && *b == counter && *c == total && *d == last
    ));
    assert!(matches!(
        analyzer.instructions()[2].original_instruction(),
        Instr::SgetWideVolatile(..)
    ));
    assert_eq!(analyzer.instructions()[4].state(), InstructionState::Original);
    let wide = node_at(&analyzer, 6).pre_register(r(1)).unwrap();
    assert_eq!(wide.category(), Category::LongLo);
}
