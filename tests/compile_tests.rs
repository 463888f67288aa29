//! End-to-end compilation tests over an in-memory catalog.

use wiql::query::{parse, tokenize, Node, NodeKind, TokenKind};
use wiql::schema::{Scope, WiqlAdapter};
use wiql::{Catalog, Compiler, CompilerConfig, Direction, SyntaxError};

const CATALOG: &str = r#"{
    "product": "http://tfs.fabrikam.com:8080/tfs",
    "current_user": "Jane Doe",
    "fields": {
        "System.Id": { "id": -3, "name": "ID", "type": "Integer" },
        "System.Title": { "id": 1, "name": "Title", "type": "String" },
        "System.State": { "id": 2, "name": "State", "type": "String" },
        "System.AssignedTo": { "id": 24, "name": "Assigned To", "type": "String" },
        "System.WorkItemType": { "id": 25, "name": "Work Item Type", "type": "String" },
        "System.TeamProject": { "id": -42, "name": "Team Project", "type": "String" },
        "System.AreaPath": { "id": -7, "name": "Area Path", "type": "TreePath" },
        "System.AreaId": { "id": -2, "name": "Area ID", "type": "Integer" },
        "System.IterationPath": { "id": -105, "name": "Iteration Path", "type": "TreePath" },
        "System.IterationId": { "id": -104, "name": "Iteration ID", "type": "Integer" },
        "System.CreatedDate": { "id": 32, "name": "Created Date", "type": "DateTime" },
        "System.History": { "id": 54, "name": "History", "type": "History", "sortable": false },
        "Microsoft.VSTS.Scheduling.RemainingWork": { "id": 10020, "name": "Remaining Work", "type": "Double" },
        "System.Links.LinkType": { "id": 100, "name": "Link Type", "type": "Integer", "usage": "WorkItemLink" }
    },
    "link_types": [
        { "id": 2, "name": "Child", "reference_name": "System.LinkTypes.Hierarchy-Forward", "is_forward": true, "topology": "Tree" },
        { "id": -2, "name": "Parent", "reference_name": "System.LinkTypes.Hierarchy-Reverse", "topology": "Tree" },
        { "id": 1, "name": "Related", "reference_name": "System.LinkTypes.Related", "is_forward": true }
    ],
    "areas": [
        { "id": 100, "name": "Fabrikam", "children": [ { "id": 101, "name": "Web" } ] }
    ],
    "iterations": [
        { "id": 200, "name": "Fabrikam", "children": [ { "id": 201, "name": "Sprint 1" } ] }
    ]
}"#;

fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG).unwrap()
}

fn optimized_where(query: &str, config: &CompilerConfig) -> String {
    let catalog = catalog();
    Compiler::new(&catalog, config)
        .optimize(query)
        .unwrap()
        .where_clause
        .map(|node| node.to_string())
        .unwrap_or_default()
}

#[test]
fn test_lexing_properties() {
    let tokens = tokenize("select [a b] from X").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::BracketedName);
    assert_eq!(tokens[1].value, "a b");

    let tokens = tokenize("-3.5e2").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Number);
    assert_eq!(tokens[0].value, "-3.5e2");

    let err = tokenize("select [name").unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::ExpectingClosingSquareBracket));
}

#[test]
fn test_duplicate_where() {
    let err = parse("select * from X where a=1 where b=2").unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::DuplicateWhere));
}

#[test]
fn test_round_trip() {
    let queries = [
        "select [System.Id], [System.Title] from WorkItems where [System.State] = 'Active' and ([System.Id] > 5 or not [System.Title] contains 'x') order by [System.Id] desc",
        "select * from WorkItemLinks where Source.[System.Id] = 1 and [System.Links.LinkType] <> 'Child' mode (MustContain, Recursive)",
        "select * from WorkItems where [System.CreatedDate] >= @today - 7 asof '2020-01-01'",
        "select * from WorkItems where [System.Id] in (1, 2, 3) and ever [System.AssignedTo] = @me",
    ];
    for query in queries {
        let printed = parse(query).unwrap().to_string();
        let reprinted = parse(&printed).unwrap().to_string();
        assert_eq!(printed, reprinted, "round trip of {}", query);
    }
}

#[test]
fn test_end_to_end_query() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiler = Compiler::new(&catalog, &config);
    let query = "select [System.Id] from WorkItems where [System.State] = 'Active' \
                 and [System.AssignedTo] = @me order by [System.Id] desc";

    let parsed = compiler.parse(query).unwrap();
    assert_eq!(parsed.from.as_ref().unwrap().name, "WorkItems");

    let bound = compiler.bind(query).unwrap();
    let Some(NodeKind::And(items)) = bound.where_clause.as_ref().map(|w| &w.kind) else {
        panic!("expected an and of two conditions");
    };
    let me = &items[1].as_condition().unwrap().right;
    assert_eq!(me.data_type(), wiql::DataType::String);

    let compiled = compiler.compile(query).unwrap();
    let group = compiled.document.child("Group").unwrap();
    assert_eq!(group.attribute("GroupOperator"), Some("and"));
    assert_eq!(group.children.len(), 2);
    assert!(group
        .children
        .iter()
        .all(|e| e.name == "Expression" && e.attribute("Operator") == Some("equals")));
    assert_eq!(
        group.children[1].child("String").unwrap().text.as_deref(),
        Some("Jane Doe")
    );

    assert_eq!(compiled.display_fields, vec!["System.Id"]);
    assert_eq!(compiled.sort_fields.len(), 1);
    assert_eq!(compiled.sort_fields[0].direction, Direction::Descending);
}

#[test]
fn test_day_precision() {
    let config = CompilerConfig {
        day_precision: true,
        ..Default::default()
    };
    assert_eq!(
        optimized_where(
            "select * from WorkItems where [System.CreatedDate] = '2020-01-01'",
            &config
        ),
        "[System.CreatedDate] >= '2020-01-01T00:00:00.000 GMT+00:00' \
         and [System.CreatedDate] < '2020-01-02T00:00:00.000 GMT+00:00'"
    );

    let catalog = catalog();
    let err = Compiler::new(&catalog, &config)
        .optimize("select * from WorkItems where [System.CreatedDate] = '2020-01-01 10:30'")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::NonZeroTime));
}

#[test]
fn test_day_precision_in_time_zone() {
    let config = CompilerConfig {
        day_precision: true,
        time_zone: "America/New_York".to_string(),
        ..Default::default()
    };
    let catalog = catalog();
    let compiled = Compiler::new(&catalog, &config)
        .compile("select * from WorkItems where [System.CreatedDate] > '2020-01-01'")
        .unwrap();
    let expression = compiled.document.child("Expression").unwrap();
    assert_eq!(expression.attribute("Operator"), Some("equalsGreater"));
    assert_eq!(
        expression.child("DateTime").unwrap().text.as_deref(),
        Some("2020-01-02T05:00:00.000Z")
    );
}

#[test]
fn test_in_expansion_matches_or() {
    let config = CompilerConfig::default();
    assert_eq!(
        optimized_where("select * from WorkItems where [System.State] in ('A', 'B', 'C')", &config),
        optimized_where(
            "select * from WorkItems where [System.State] = 'A' or [System.State] = 'B' or [System.State] = 'C'",
            &config
        )
    );
}

#[test]
fn test_optimize_is_idempotent() {
    let catalog = catalog();
    let config = CompilerConfig {
        day_precision: true,
        ..Default::default()
    };
    let adapter = WiqlAdapter::new(&catalog, &config).unwrap();
    let queries = [
        "select * from WorkItems where [System.State] in ('A', 'B') and not not [System.Id] > 3",
        "select * from WorkItems where [System.CreatedDate] <> '2020-01-01' or [System.CreatedDate] <= @today",
        "select * from WorkItems where [System.TeamProject] = 'Fabrikam' and [System.State] <> ''",
        "select * from WorkItems where [Remaining Work] = 2 + 1.5",
    ];
    for query in queries {
        let mut select = parse(query).unwrap();
        select.bind(&adapter).unwrap();
        let once = select.optimize(&adapter).unwrap();
        let table = once.from.clone();
        let scope = Scope::new(table.as_ref());
        let where_once: Node = once.where_clause.clone().unwrap();
        let where_twice = where_once.clone().optimize(&adapter, &scope).unwrap();
        assert_eq!(where_once, where_twice, "idempotence of {}", query);
    }
}

#[test]
fn test_team_project_becomes_area_id() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiled = Compiler::new(&catalog, &config)
        .compile("select * from WorkItems where [System.TeamProject] = 'Fabrikam'")
        .unwrap();
    let expression = compiled.document.child("Expression").unwrap();
    assert_eq!(expression.attribute("Column"), Some("System.AreaId"));
    assert_eq!(expression.attribute("Operator"), Some("under"));
    assert_eq!(expression.child("Number").unwrap().text.as_deref(), Some("100"));
}

#[test]
fn test_iteration_path() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiled = Compiler::new(&catalog, &config)
        .compile("select * from WorkItems where [System.IterationPath] = 'Fabrikam\\Sprint 1'")
        .unwrap();
    let expression = compiled.document.child("Expression").unwrap();
    assert_eq!(expression.attribute("Column"), Some("System.IterationId"));
    assert_eq!(expression.child("Number").unwrap().text.as_deref(), Some("201"));
}

#[test]
fn test_recursive_link_query() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiler = Compiler::new(&catalog, &config);

    let compiled = compiler
        .compile(
            "select [System.Id] from WorkItemLinks \
             where Source.[System.WorkItemType] = 'Epic' \
             and [System.Links.LinkType] = 'System.LinkTypes.Hierarchy-Forward' \
             and Target.[System.State] <> 'Removed' \
             mode (Recursive)",
        )
        .unwrap();
    assert!(compiled.is_link_query());
    let document = &compiled.document;
    assert_eq!(document.name, "LinksQuery");
    assert_eq!(document.attribute("Type"), Some("mayContain"));
    assert_eq!(document.attribute("Recursive"), Some("2"));
    assert!(document.child("LeftQuery").is_some());
    assert!(document.child("LinkQuery").is_none());
    assert!(document.child("RightQuery").is_some());

    let err = compiler
        .compile("select * from WorkItemLinks where [System.Links.LinkType] = 'Parent' mode (Recursive)")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::InvalidLinkTypeNameRecursive));
}

#[test]
fn test_xml_output() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiled = Compiler::new(&catalog, &config)
        .compile("select * from WorkItems where [System.Title] contains 'crash & burn'")
        .unwrap();
    let xml = compiled.document.to_xml().unwrap();
    assert!(xml.starts_with("<Query Product=\"http://tfs.fabrikam.com:8080/tfs\">"));
    assert!(xml.contains("Operator=\"contains\""));
    assert!(xml.contains("crash &amp; burn"));
}

#[test]
fn test_deep_nesting_is_rejected() {
    let depth = wiql::query::MAX_NESTING_DEPTH + 10;
    let query = format!(
        "select * from WorkItems where {}[System.Id] = 1{}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let err = parse(&query).unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::TooComplexExpression));
}

#[test]
fn test_catalog_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, CATALOG).unwrap();
    let catalog = Catalog::from_json_file(&path).unwrap();
    let config = CompilerConfig::default();
    assert!(Compiler::new(&catalog, &config)
        .compile("select * from issues where [Area Path] under 'Fabrikam\\Web'")
        .is_ok());
}

#[test]
fn test_arithmetic_overflow_is_an_error() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiler = Compiler::new(&catalog, &config);

    let err = compiler
        .optimize(
            "select [System.Id] from WorkItems \
             where [System.CreatedDate] > '2020-01-01' - -9223372036854775808",
        )
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::InvalidDate));

    let err = compiler
        .compile("select * from WorkItems where [System.CreatedDate] > '2020-01-01' + 9223372036854775807")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::InvalidDate));
}

#[test]
fn test_numeric_folding_stays_finite() {
    let catalog = catalog();
    let config = CompilerConfig::default();
    let compiler = Compiler::new(&catalog, &config);

    let err = compiler
        .compile("select * from WorkItems where [Microsoft.VSTS.Scheduling.RemainingWork] = 1e308 + 1e308")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::WrongTypeForArithmetic));

    let err = compiler
        .compile("select * from WorkItems where [Microsoft.VSTS.Scheduling.RemainingWork] = -1e308 - 1e308")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::WrongTypeForArithmetic));

    assert_eq!(
        optimized_where(
            "select * from WorkItems where [Microsoft.VSTS.Scheduling.RemainingWork] = 1e308 - 1e308",
            &config
        ),
        "[Microsoft.VSTS.Scheduling.RemainingWork] = 0"
    );
}

#[test]
fn test_ever_with_day_precision() {
    let catalog = catalog();
    let config = CompilerConfig {
        day_precision: true,
        ..Default::default()
    };
    let compiler = Compiler::new(&catalog, &config);

    let err = compiler
        .bind("select * from WorkItems where ever [System.CreatedDate] = '2020-01-01'")
        .unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxError::EverWithDatePrecision));

    // without day precision the same condition is accepted
    let config = CompilerConfig::default();
    assert!(Compiler::new(&catalog, &config)
        .bind("select * from WorkItems where ever [System.CreatedDate] = '2020-01-01'")
        .is_ok());
}

#[test]
fn test_raw_document_lists_server_macros() {
    let catalog = catalog();
    let config = CompilerConfig {
        server_side_macros: true,
        ..Default::default()
    };
    let compiled = Compiler::new(&catalog, &config)
        .compile("select * from WorkItems where [System.Title] = @currentIteration or [System.State] = @currentIteration")
        .unwrap();
    let contexts: Vec<_> = compiled
        .document
        .children
        .iter()
        .filter(|c| c.name == "Context")
        .collect();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].attribute("Key"), Some("currentIteration"));
    assert_eq!(contexts[0].attribute("ValueType"), Some("String"));
}
