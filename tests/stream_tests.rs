//! Streaming-path tests: dependency-ordered delivery, forward references,
//! cycle and dangling-reference detection, cancellation, and the version
//! gate.

use std::collections::BTreeSet;

use modex::{
    CancelToken, Consumer, ElementCore, ElementInfo, IdAllocator, ImportOptions, ImportOutcome,
    Library, Method, Model, Modex, ModexError, Package, Param, PrimitiveType, Relationship,
    Result, TypeDecl, TypeKind, Var, VarKind, Version,
};

/// Records (kind, id) pairs in delivery order.
#[derive(Debug, Default)]
struct Collecting {
    order: Vec<(String, u64)>,
}

impl Collecting {
    fn push(&mut self, kind: &str, info: &ElementInfo) {
        self.order.push((kind.to_owned(), info.id));
    }

    fn position_of(&self, id: u64) -> usize {
        self.order
            .iter()
            .position(|(_, delivered)| *delivered == id)
            .unwrap_or(usize::MAX)
    }

    fn ids(&self) -> Vec<u64> {
        self.order.iter().map(|(_, id)| *id).collect()
    }
}

impl Consumer for Collecting {
    fn library(&mut self, info: ElementInfo) -> Result<()> {
        self.push("library", &info);
        Ok(())
    }

    fn package(&mut self, info: ElementInfo) -> Result<()> {
        self.push("package", &info);
        Ok(())
    }

    fn primitive(&mut self, info: ElementInfo) -> Result<()> {
        self.push("primitive", &info);
        Ok(())
    }

    fn class(
        &mut self,
        info: ElementInfo,
        _extends: Option<u64>,
        _implements: BTreeSet<u64>,
    ) -> Result<()> {
        self.push("class", &info);
        Ok(())
    }

    fn interface(
        &mut self,
        info: ElementInfo,
        _extends: Option<u64>,
        _implements: BTreeSet<u64>,
    ) -> Result<()> {
        self.push("interface", &info);
        Ok(())
    }

    fn method(
        &mut self,
        info: ElementInfo,
        _overrides: BTreeSet<u64>,
        params: Vec<Param>,
    ) -> Result<()> {
        self.push("method", &info);
        // Every parameter's type must already have been delivered.
        for param in &params {
            assert_ne!(self.position_of(param.type_id), usize::MAX);
        }
        Ok(())
    }

    fn relationship(
        &mut self,
        info: ElementInfo,
        _schema_type: &str,
        origin: u64,
        dest: u64,
    ) -> Result<()> {
        assert_ne!(self.position_of(origin), usize::MAX);
        assert_ne!(self.position_of(dest), usize::MAX);
        self.push("relationship", &info);
        Ok(())
    }
}

fn stream(model: &Model) -> Result<(ImportOutcome, Collecting)> {
    let mut buffer = Vec::new();
    Modex::export_to_writer(&mut buffer, model)?;
    let mut consumer = Collecting::default();
    let outcome = Modex::import_stream_from_reader(
        buffer.as_slice(),
        &mut consumer,
        ImportOptions::default(),
    )?;
    Ok((outcome, consumer))
}

/// Library "L" → Package "p" → Class "C" extending Class "Object", where
/// "Object" is declared after "C" in the file. "C" must still reach the
/// consumer only after "Object".
#[test]
fn forward_extends_is_delivered_after_its_target() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    let mut library = Library::new(ElementCore::named(alloc.next_id(), "L"));
    let mut package = Package::new(ElementCore::named(alloc.next_id(), "p"));

    let mut class_c = TypeDecl::new(ElementCore::named(alloc.next_id(), "C"), TypeKind::Class);
    let c_id = class_c.core.id;
    let object_id = alloc.next_id();
    class_c.extends = Some(object_id);
    let object = TypeDecl::new(ElementCore::named(object_id, "Object"), TypeKind::Class);

    // File order: C first, Object second.
    package.types.push(class_c);
    package.types.push(object);
    library.packages.push(package);
    model.libraries.push(library);

    let (outcome, consumer) = stream(&model).expect("stream");
    assert!(matches!(outcome, ImportOutcome::Completed(_)));
    assert!(
        consumer.position_of(object_id) < consumer.position_of(c_id),
        "delivery order was {:?}",
        consumer.order
    );
}

#[test]
fn every_record_is_delivered_exactly_once() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    let int_id = alloc.next_id();
    model
        .primitives
        .push(PrimitiveType::new(ElementCore::named(int_id, "int")));

    let mut library = Library::new(ElementCore::named(alloc.next_id(), "L"));
    let mut package = Package::new(ElementCore::named(alloc.next_id(), "p"));
    for n in 0..10 {
        let mut class = TypeDecl::new(
            ElementCore::named(alloc.next_id(), format!("C{n}")),
            TypeKind::Class,
        );
        let mut field = Var::new(
            ElementCore::named(alloc.next_id(), "f"),
            VarKind::Field,
            int_id,
        );
        field.array_dim = Some(2);
        class.fields.push(field);
        package.types.push(class);
    }
    library.packages.push(package);
    model.libraries.push(library);

    let (outcome, consumer) = stream(&model).expect("stream");
    let ImportOutcome::Completed(stats) = outcome else {
        panic!("unexpected cancellation");
    };
    assert_eq!(stats.submitted, stats.delivered);

    let mut seen = BTreeSet::new();
    for id in consumer.ids() {
        assert!(seen.insert(id), "id {id} delivered twice");
    }
}

#[test]
fn method_signatures_wait_for_forward_parameter_types() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    let mut library = Library::new(ElementCore::named(alloc.next_id(), "L"));
    let mut package = Package::new(ElementCore::named(alloc.next_id(), "p"));

    let mut class_c = TypeDecl::new(ElementCore::named(alloc.next_id(), "C"), TypeKind::Class);
    let mut method = Method::new(ElementCore::named(alloc.next_id(), "consume"));
    let method_id = method.core.id;
    let d_id = alloc.next_id();
    method.params.push(Var::new(
        ElementCore::named(alloc.next_id(), "arg"),
        VarKind::Param { index: 0 },
        d_id,
    ));
    class_c.methods.push(method);

    let class_d = TypeDecl::new(ElementCore::named(d_id, "D"), TypeKind::Class);

    package.types.push(class_c);
    package.types.push(class_d);
    library.packages.push(package);
    model.libraries.push(library);

    let (_, consumer) = stream(&model).expect("stream");
    assert!(
        consumer.position_of(d_id) < consumer.position_of(method_id),
        "delivery order was {:?}",
        consumer.order
    );
}

#[test]
fn reference_cycle_fails_with_both_ids_reported() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    let mut library = Library::new(ElementCore::named(alloc.next_id(), "L"));
    let mut package = Package::new(ElementCore::named(alloc.next_id(), "p"));

    let a_id = alloc.next_id();
    let b_id = alloc.next_id();
    let mut class_a = TypeDecl::new(ElementCore::named(a_id, "A"), TypeKind::Class);
    class_a.extends = Some(b_id);
    let mut class_b = TypeDecl::new(ElementCore::named(b_id, "B"), TypeKind::Class);
    class_b.extends = Some(a_id);
    package.types.push(class_a);
    package.types.push(class_b);
    library.packages.push(package);
    model.libraries.push(library);

    let err = stream(&model).expect_err("cycle must fail the import");
    let ModexError::Dependency(message) = &err else {
        panic!("expected a dependency error, got {err}");
    };
    assert!(message.contains("cycle"), "message: {message}");
    assert!(message.contains("name: A"), "message: {message}");
    assert!(message.contains("name: B"), "message: {message}");
}

#[test]
fn dangling_reference_fails_the_import() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    model.relationships.push(Relationship::new(
        ElementCore::new(alloc.next_id()),
        77,
        78,
        "broken",
    ));

    let err = stream(&model).expect_err("dangling must fail the import");
    assert!(matches!(err, ModexError::Dependency(_)), "got {err}");
    assert!(err.to_string().contains("undeclared"), "got {err}");
}

/// The declared count is advisory: a header claiming five elements over a
/// four-element body still decodes cleanly, with no count mismatch.
#[test]
fn declared_count_is_advisory_only() {
    let payload = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                   <g><m>5</m>\
                   <j><c>int</c><d>0</d></j>\
                   <j><c>long</c><d>1</d></j>\
                   <j><c>byte</c><d>2</d></j>\
                   <j><c>char</c><d>3</d></j>\
                   </g>";
    let compressed = modex::compression::compress_to_vec(payload).expect("compress");

    let mut consumer = Collecting::default();
    let outcome = Modex::import_stream_from_reader(
        compressed.as_slice(),
        &mut consumer,
        ImportOptions::default(),
    )
    .expect("import");

    let ImportOutcome::Completed(stats) = outcome else {
        panic!("unexpected cancellation");
    };
    assert_eq!(stats.declared, Some(5));
    assert_eq!(consumer.order.len(), 4);
    assert_eq!(stats.submitted, stats.delivered);
}

#[test]
fn missing_required_id_aborts_with_the_field_name() {
    let payload = "<g><h><c>lib</c></h></g>";
    let compressed = modex::compression::compress_to_vec(payload).expect("compress");
    let err = Modex::import_stream_from_reader(
        compressed.as_slice(),
        &mut Collecting::default(),
        ImportOptions::default(),
    )
    .expect_err("missing id");
    let ModexError::MissingField(message) = &err else {
        panic!("expected missing-field, got {err}");
    };
    assert!(message.contains("ELEMENT_ID"), "message: {message}");
}

#[test]
fn unknown_tags_abort_the_import() {
    let payload = "<g><zz>junk</zz></g>";
    let compressed = modex::compression::compress_to_vec(payload).expect("compress");
    let err = Modex::import_stream_from_reader(
        compressed.as_slice(),
        &mut Collecting::default(),
        ImportOptions::default(),
    )
    .expect_err("unknown tag");
    assert!(matches!(err, ModexError::UnknownTag(_)), "got {err}");
}

#[test]
fn version_gate_rejects_major_minor_mismatch() {
    let model = Model::new(Some("2.0.0".into()), None);
    let mut buffer = Vec::new();
    Modex::export_to_writer(&mut buffer, &model).expect("export");

    let options = ImportOptions {
        expected_version: Some(Version::parse("1.2.0").expect("version")),
        ..ImportOptions::default()
    };
    let err = Modex::import_stream_from_reader(
        buffer.as_slice(),
        &mut Collecting::default(),
        options,
    )
    .expect_err("version mismatch");
    assert!(matches!(err, ModexError::Version(_)), "got {err}");
}

#[test]
fn version_gate_accepts_micro_differences() {
    let model = Model::new(Some("1.2.9".into()), None);
    let mut buffer = Vec::new();
    Modex::export_to_writer(&mut buffer, &model).expect("export");

    let options = ImportOptions {
        expected_version: Some(Version::parse("1.2.0").expect("version")),
        ..ImportOptions::default()
    };
    let outcome = Modex::import_stream_from_reader(
        buffer.as_slice(),
        &mut Collecting::default(),
        options,
    )
    .expect("compatible versions");
    assert!(matches!(outcome, ImportOutcome::Completed(_)));
}

/// Cancels the shared token as soon as the first library arrives.
#[derive(Debug)]
struct CancelAfterLibrary {
    token: CancelToken,
    delivered: usize,
}

impl Consumer for CancelAfterLibrary {
    fn library(&mut self, _info: ElementInfo) -> Result<()> {
        self.delivered += 1;
        self.token.cancel();
        Ok(())
    }

    fn package(&mut self, _info: ElementInfo) -> Result<()> {
        self.delivered += 1;
        Ok(())
    }
}

#[test]
fn cancellation_yields_an_absent_result_not_an_error() {
    let mut alloc = IdAllocator::new();
    let mut model = Model::new(None, None);
    let mut library = Library::new(ElementCore::named(alloc.next_id(), "L"));
    for n in 0..5 {
        library
            .packages
            .push(Package::new(ElementCore::named(alloc.next_id(), format!("p{n}"))));
    }
    model.libraries.push(library);

    let mut buffer = Vec::new();
    Modex::export_to_writer(&mut buffer, &model).expect("export");

    let token = CancelToken::new();
    let mut consumer = CancelAfterLibrary {
        token: token.clone(),
        delivered: 0,
    };
    let options = ImportOptions {
        cancel: token,
        ..ImportOptions::default()
    };
    let outcome =
        Modex::import_stream_from_reader(buffer.as_slice(), &mut consumer, options)
            .expect("cancellation is not an error");

    assert!(matches!(outcome, ImportOutcome::Cancelled));
    // The library itself was delivered; the remaining packages were not.
    assert!(consumer.delivered < 6);
}
