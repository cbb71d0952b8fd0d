#[doc(hidden)]
#[cfg(any(test, doctest))]
#[allow(dead_code)]
pub mod test_utils {
    #[allow(unused_must_use)]
    pub fn trace() {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    }
    #[allow(unused_must_use)]
    pub fn debug() {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .try_init();
    }
    #[allow(unused_must_use)]
    pub fn warn() {
        env_logger::builder()
            .filter_level(log::LevelFilter::Warn)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::mouth::Mouth;
    use crate::engine::state::Mode;
    use crate::engine::BufferListener;
    use crate::prelude::*;
    use crate::tex::characters::StringLineSource;
    use crate::tex::units::{Dimension, Unit};
    use crate::utils::errors::ErrorCollector;
    use crate::utils::Ptr;
    use either::Either;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct PlainEngine;
    impl EngineTypes for PlainEngine {
        type Listener = BufferListener;
        type Diagnostics = ErrorCollector;
    }
    type Ip = Interpreter<PlainEngine>;

    fn new_ip() -> Ip {
        Interpreter::new(BufferListener::default(), ErrorCollector::default())
    }

    /// Tokenize a snippet with the interpreter's interner, dropping the
    /// end-of-input space the mouth appends to a mid-line final line.
    fn tokenize(ip: &mut Ip, s: &str) -> Vec<Token> {
        let src: StringLineSource = s.into();
        let mut m = Mouth::new(src);
        let mut out = Vec::new();
        while let Some(t) = m
            .get_next(ip.state.catcode_scheme(), &mut ip.interner)
            .unwrap()
        {
            out.push(t);
        }
        if matches!(out.last(), Some(Token::Space)) && !s.ends_with(' ') {
            out.pop();
        }
        out
    }

    fn rendered(ip: &Ip) -> String {
        ip.listener
            .tokens
            .iter()
            .map(|t| ip.display_token(t))
            .collect()
    }

    fn innermost(e: TeXError) -> TeXError {
        match e {
            TeXError::At { inner, .. } => innermost(*inner),
            e => e,
        }
    }

    #[test]
    fn plain_text_processing() {
        let mut ip = new_ip();
        ip.run_str("Hello {world}!").unwrap();
        assert_eq!(rendered(&ip), "Hello world! ");
        assert!(ip.diagnostics.errors.is_empty());
    }

    #[test]
    fn comments_pass_through_processing() {
        let mut ip = new_ip();
        ip.run_str("a% remark\nb").unwrap();
        assert!(ip
            .listener
            .tokens
            .iter()
            .any(|t| matches!(t, Token::Comment(c) if &**c == " remark")));
        assert_eq!(rendered(&ip), "a% remarkb ");
    }

    #[test]
    fn macro_expansion_with_arguments() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "Hello #1!");
        ip.define_macro("greet", MacroDef::new(1, body.into()).unwrap(), false);
        ip.run_str("\\greet{world}").unwrap();
        assert_eq!(rendered(&ip), "Hello world! ");
    }

    #[test]
    fn macro_expansion_is_spliced_before_siblings() {
        let mut ip = new_ip();
        let inner = tokenize(&mut ip, "x");
        ip.define_macro("inner", MacroDef::new(0, inner.into()).unwrap(), false);
        let outer = tokenize(&mut ip, "\\inner y");
        ip.define_macro("outer", MacroDef::new(0, outer.into()).unwrap(), false);
        ip.run_str("\\outer z").unwrap();
        assert_eq!(rendered(&ip), "xyz ");
    }

    #[test]
    fn expand_fully_reaches_a_fixed_point() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "#1#1");
        ip.define_macro("dup", MacroDef::new(1, body.into()).unwrap(), false);
        let input = tokenize(&mut ip, "\\dup{ab}");
        let once = ip.expand_fully(input).unwrap();
        assert_eq!(
            once.iter().map(|t| ip.display_token(t)).collect::<String>(),
            "abab"
        );
        // idempotence: a fully expanded sequence expands to itself
        let twice = ip.expand_fully(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn expansion_distinguishes_empty_from_unexpandable() {
        let mut ip = new_ip();
        ip.define_macro("null", MacroDef::new(0, TokenList::empty()).unwrap(), false);
        let null = Token::ControlSequence(ip.interner.intern("null"));
        let letter = Token::Character('a', CategoryCode::Letter);
        assert!(null.can_expand(&ip));
        assert!(!letter.can_expand(&ip));
        assert_eq!(ip.expand_once(&null, None).unwrap(), Some(Vec::new()));
        assert_eq!(ip.expand_once(&letter, None).unwrap(), None);
    }

    #[test]
    fn protected_macros_block_full_expansion_but_still_process() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "x");
        ip.define_macro(
            "prot",
            MacroDef::new(0, body.into()).unwrap().protected(),
            false,
        );
        let tok = Token::ControlSequence(ip.interner.intern("prot"));
        assert!(tok.is_expansion_blocker(&ip));
        let out = ip.expand_fully(vec![tok.clone()]).unwrap();
        assert_eq!(out, vec![tok]);
        ip.run_str("\\prot").unwrap();
        assert_eq!(rendered(&ip), "x");
    }

    #[test]
    fn noexpand_marker_shields_one_token() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "x");
        ip.define_macro("m", MacroDef::new(0, body.into()).unwrap(), false);
        let m = Token::ControlSequence(ip.interner.intern("m"));
        let out = ip
            .expand_fully(vec![
                Token::Marker(crate::tex::tokens::Marker::Noexpand),
                m.clone(),
                m.clone(),
            ])
            .unwrap();
        assert_eq!(
            out,
            vec![m, Token::Character('x', CategoryCode::Letter)]
        );
    }

    struct Global;
    impl TeXCommand<PlainEngine> for Global {
        fn name(&self) -> &str {
            "global"
        }
        fn process(
            &self,
            ip: &mut Ip,
            _local: Option<&mut crate::engine::expansion::TokenStack>,
        ) -> TeXResult<()> {
            ip.set_global_prefix();
            Ok(())
        }
    }

    #[test]
    fn local_register_assignment_reverts_on_group_close() {
        let mut ip = new_ip();
        let def = ip.define_register("mycount", RegisterKind::Int, false);
        ip.run_str("{\\mycount=5 }").unwrap();
        assert_eq!(ip.numeric_register_value(def), Value::Int(0));
        ip.run_str("\\mycount=7").unwrap();
        assert_eq!(ip.numeric_register_value(def), Value::Int(7));
        // and a local shadow reverts to the committed value
        ip.run_str("{\\mycount=5 }").unwrap();
        assert_eq!(ip.numeric_register_value(def), Value::Int(7));
    }

    #[test]
    fn global_assignment_survives_nested_group_close() {
        let mut ip = new_ip();
        let def = ip.define_register("mycount", RegisterKind::Int, false);
        ip.define_command("global", Command::Custom(Ptr::new(Global)), true);
        ip.run_str("{{\\global\\mycount=9 }}").unwrap();
        assert_eq!(ip.numeric_register_value(def), Value::Int(9));
    }

    #[test]
    fn register_assignment_machinery() {
        let mut ip = new_ip();
        let count = ip.define_register("mycount", RegisterKind::Int, false);
        let dimen = ip.define_register("mydimen", RegisterKind::Dim, false);
        let toks = ip.define_register("mytoks", RegisterKind::Tokens, false);
        let copy = ip.define_register("mycopy", RegisterKind::Int, false);

        // `=` is optional, a following register clones its contents
        ip.run_str("\\mycount=12 \\mycopy\\mycount \\mydimen=1.5pt \\mytoks={ab}")
            .unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(12));
        assert_eq!(ip.numeric_register_value(copy), Value::Int(12));
        assert_eq!(
            ip.numeric_register_value(dimen),
            Value::Dim(Dimension::new(1.5, Unit::Pt))
        );
        assert_eq!(
            ip.token_register_value(toks).to_vec(),
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Character('b', CategoryCode::Letter),
            ]
        );

        // a token register assigned a plain value wraps it in a list
        ip.run_str("\\mytoks=x").unwrap();
        assert_eq!(
            ip.token_register_value(toks).to_vec(),
            vec![Token::Character('x', CategoryCode::Letter)]
        );
    }

    #[test]
    fn registers_resolve_where_numbers_are_required() {
        let mut ip = new_ip();
        let count = ip.define_register("mycount", RegisterKind::Int, false);
        let copy = ip.define_register("mycopy", RegisterKind::Int, false);
        let dimen = ip.define_register("mydimen", RegisterKind::Dim, false);
        // the sign forces a fresh value scan, which resolves the register
        // through its numeric capability
        ip.run_str("\\mycount=12 \\mycopy=-\\mycount \\mydimen=-\\mycount pt")
            .unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(12));
        assert_eq!(ip.numeric_register_value(copy), Value::Int(-12));
        assert_eq!(
            ip.numeric_register_value(dimen),
            Value::Dim(Dimension::new(-12.0, Unit::Pt))
        );
    }

    #[test]
    fn register_arithmetic() {
        let mut ip = new_ip();
        let count = ip.define_register("mycount", RegisterKind::Int, false);
        let dimen = ip.define_register("mydimen", RegisterKind::Dim, false);
        ip.run_str("\\mycount=10 \\mydimen=2pt").unwrap();
        ip.advance_register(count, Either::Left(5), false).unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(15));
        ip.multiply_register(count, 3, false).unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(45));
        ip.divide_register(count, 4, false).unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(11));
        assert_eq!(
            innermost(ip.divide_register(count, 0, false).unwrap_err()),
            TeXError::DivisionByZero
        );
        ip.advance_register(dimen, Either::Right(Dimension::new(1.5, Unit::Pt)), false)
            .unwrap();
        assert_eq!(
            ip.numeric_register_value(dimen),
            Value::Dim(Dimension::new(3.5, Unit::Pt))
        );
    }

    #[test]
    fn textual_coercion_of_number_values() {
        let mut ip = new_ip();
        let count = ip.define_register("mycount", RegisterKind::Int, false);
        ip.run_str("\\mycount={42}").unwrap();
        assert_eq!(ip.numeric_register_value(count), Value::Int(42));
        // coercion failure names the offending token and is fatal
        let err = ip.run_str("\\mycount=x").unwrap_err();
        assert_eq!(innermost(err), TeXError::NumberExpected("x".into()));
        assert!(!ip.diagnostics.errors.is_empty());
    }

    #[test]
    fn unexpected_end_group_is_fatal() {
        let mut ip = new_ip();
        let err = ip.run_str("a}").unwrap_err();
        assert_eq!(innermost(err), TeXError::UnexpectedEndGroup("}".into()));
    }

    #[test]
    fn unterminated_group_is_fatal() {
        let mut ip = new_ip();
        let err = ip.run_str("{a").unwrap_err();
        assert_eq!(innermost(err), TeXError::UnterminatedGroup("{".into()));
    }

    #[test]
    fn plain_end_group_never_closes_math() {
        let mut ip = new_ip();
        let err = ip.run_str("$x}").unwrap_err();
        assert_eq!(innermost(err), TeXError::UnexpectedEndGroup("}".into()));
    }

    #[test]
    fn display_math_must_close_doubled() {
        let mut ip = new_ip();
        let err = ip.run_str("$$x$ y").unwrap_err();
        assert_eq!(innermost(err), TeXError::DisplayMathEndedInline);
        let mut ip = new_ip();
        let err = ip.run_str("$x").unwrap_err();
        assert_eq!(innermost(err), TeXError::MissingEndMath);
    }

    struct ModeProbe(Rc<RefCell<Vec<Mode>>>);
    impl TeXCommand<PlainEngine> for ModeProbe {
        fn name(&self) -> &str {
            "probe"
        }
        fn process(
            &self,
            ip: &mut Ip,
            _local: Option<&mut crate::engine::expansion::TokenStack>,
        ) -> TeXResult<()> {
            self.0.borrow_mut().push(ip.state.mode());
            Ok(())
        }
    }

    #[test]
    fn math_groups_switch_and_restore_the_mode() {
        let mut ip = new_ip();
        let modes = Rc::new(RefCell::new(Vec::new()));
        ip.define_command(
            "probe",
            Command::Custom(Ptr::new(ModeProbe(modes.clone()))),
            true,
        );
        ip.run_str("\\probe$a\\probe$\\probe$$b\\probe$$\\probe")
            .unwrap();
        assert_eq!(
            *modes.borrow(),
            vec![
                Mode::Text,
                Mode::InlineMath,
                Mode::Text,
                Mode::DisplayMath,
                Mode::Text,
            ]
        );
    }

    #[test]
    fn double_superscript_recovers_with_empty_group() {
        let mut ip = new_ip();
        ip.run_str("a^^b").unwrap();
        assert_eq!(
            ip.diagnostics.errors,
            vec![TeXError::DoubleSuperscript]
        );
        assert_eq!(
            ip.listener.tokens,
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Character('^', CategoryCode::Superscript),
                Token::Character('^', CategoryCode::Superscript),
                Token::Character('b', CategoryCode::Letter),
                Token::Space,
            ]
        );
    }

    #[test]
    fn double_subscript_recovers_too() {
        let mut ip = new_ip();
        ip.run_str("a__b").unwrap();
        assert_eq!(ip.diagnostics.errors, vec![TeXError::DoubleSubscript]);
    }

    #[test]
    fn content_commands_expand_to_their_payload() {
        let mut ip = new_ip();
        ip.define_command(
            "name",
            Command::Content(Value::Text("jas".into())),
            false,
        );
        ip.define_command("answer", Command::Content(Value::Int(42)), false);
        let input = tokenize(&mut ip, "\\name\\answer");
        let out = ip.expand_fully(input).unwrap();
        assert_eq!(
            out.iter().map(|t| ip.display_token(t)).collect::<String>(),
            "jas42"
        );
        // processed rather than expanded, the payload stays opaque
        ip.run_str("\\answer").unwrap();
        assert_eq!(ip.listener.tokens, vec![Token::Value(Value::Int(42))]);
    }

    #[test]
    fn let_style_aliasing_binds_the_command_value() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "x");
        let a = ip.define_macro("a", MacroDef::new(0, body.into()).unwrap(), false);
        let cmd = ip.state.get_command(a).cloned().unwrap();
        ip.define_command("b", cmd, false);
        ip.run_str("\\b").unwrap();
        assert_eq!(rendered(&ip), "x");
    }

    #[test]
    fn catcode_changes_are_scoped() {
        let mut ip = new_ip();
        assert_eq!(ip.state.get_catcode('@'), CategoryCode::Other);
        ip.state.push_frame();
        ip.state.set_catcode('@', CategoryCode::Letter, false);
        assert_eq!(ip.state.get_catcode('@'), CategoryCode::Letter);
        ip.state.pop_frame();
        assert_eq!(ip.state.get_catcode('@'), CategoryCode::Other);
    }

    #[test]
    fn expansion_budget_catches_runaway_recursion() {
        let mut ip: Ip = Interpreter::with_settings(
            BufferListener::default(),
            ErrorCollector::default(),
            EngineSettings {
                expansion_budget: Some(50),
                ..EngineSettings::default()
            },
        );
        let body = tokenize(&mut ip, "\\loop");
        ip.define_macro("loop", MacroDef::new(0, body.into()).unwrap(), false);
        let err = ip.run_str("\\loop").unwrap_err();
        assert_eq!(innermost(err), TeXError::ExpansionBudgetExhausted(50));
    }

    #[test]
    fn undefined_control_sequence_is_fatal() {
        let mut ip = new_ip();
        let err = ip.run_str("\\nosuchthing").unwrap_err();
        assert_eq!(
            innermost(err),
            TeXError::UndefinedControlSequence("nosuchthing".into())
        );
    }

    #[test]
    fn source_forms_round_trip_through_the_mouth() {
        let mut ip = new_ip();
        let samples = vec![
            Token::ControlSequence(ip.interner.intern("foo")),
            Token::ControlSequence(ip.interner.intern("&")),
            Token::Character('x', CategoryCode::Letter),
            Token::Character('!', CategoryCode::Other),
            Token::Character('#', CategoryCode::Parameter),
            Token::Param(7),
            Token::Comment(" note".into()),
        ];
        for t in samples {
            let src = ip.source_token(&t);
            let back = tokenize(&mut ip, &src);
            assert_eq!(back, vec![t.clone()], "failed for source `{}`", src);
        }
    }

    #[test]
    fn group_source_forms_reassemble() {
        let mut ip = new_ip();
        let group = Token::Group(Group {
            kind: GroupKind::Brace {
                open: '{',
                close: '}',
            },
            tokens: vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Group(Group::math(
                    '$',
                    false,
                    vec![Token::Character('b', CategoryCode::Letter)],
                )),
            ],
        });
        let src = ip.source_token(&group);
        assert_eq!(src, "{a$b$}");
        let mut flat = tokenize(&mut ip, &src);
        assert_eq!(
            flat.remove(0),
            Token::Character('{', CategoryCode::BeginGroup)
        );
        ip.stack.splice_front(flat);
        let back = ip.read_group('{', None).unwrap();
        assert_eq!(Token::Group(back), group);
    }

    #[test]
    fn stringify_splits_control_sequences_with_backreferences() {
        let mut ip = new_ip();
        let cs = ip.interner.intern("par");
        let out = ip.stringify(&Token::ControlSequence(cs));
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], Token::Character('\\', CategoryCode::Other));
        assert!(matches!(out[1], Token::CsChar { cs: c, ch: 'p' } if c == cs));
        assert!(matches!(out[3], Token::CsChar { cs: c, ch: 'r' } if c == cs));
        // each split character occupies a single lexical slot
        assert!(out.iter().all(|t| t.is_single_token()));
    }

    #[test]
    fn collaborators_can_inject_recovery_tokens() {
        let mut ip = new_ip();
        ip.input_str("b");
        ip.stack
            .requeue(Token::Character('a', CategoryCode::Letter));
        ip.run().unwrap();
        assert_eq!(rendered(&ip), "ab ");
    }

    #[test]
    fn local_stacks_behave_like_the_main_stack() {
        let mut ip = new_ip();
        let body = tokenize(&mut ip, "(#1)");
        ip.define_macro("wrap", MacroDef::new(1, body.into()).unwrap(), false);
        let wrap = Token::ControlSequence(ip.interner.intern("wrap"));

        // argument supplied on a local stack
        let mut local = crate::engine::expansion::TokenStack::from(vec![Token::Character(
            'x',
            CategoryCode::Letter,
        )]);
        let out = ip.expand_once(&wrap, Some(&mut local)).unwrap().unwrap();
        assert!(local.is_empty());

        // the same argument supplied on the main stack
        ip.stack
            .requeue(Token::Character('x', CategoryCode::Letter));
        let out2 = ip.expand_once(&wrap, None).unwrap().unwrap();
        assert_eq!(out, out2);
    }
}
