//! 规则引擎集成测试
//!
//! 测试完整的规则校验、条件求值与动作执行工作流。

use mockall::mock;
use mockall::predicate::eq;
use parking_lot::Mutex;
use rule_engine::{
    ActionRun, ActionState, Actionlet, Condition, ConditionGroup, ConditionLoader, Conditionlet,
    DataType, LogicalOperator, Parameters, ParametersExt, Persona, PersonaDirectory, Registry, Request,
    RequestContext, Result, Rule, RuleAction, RuleError, RuleEvaluator, RuleStore,
    StaticPersonaDirectory, Visitor,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;

mock! {
    pub Loader {}

    impl ConditionLoader for Loader {
        fn load_conditions(&self, group_id: &str) -> anyhow::Result<Vec<Condition>>;
    }
}

mock! {
    pub Directory {}

    impl PersonaDirectory for Directory {
        fn find_persona(&self, persona_id: &str) -> anyhow::Result<Option<Persona>>;
    }
}

// ==================== 测试插件 ====================

/// 返回固定结果并记录求值顺序的条件插件
struct Scripted {
    log: Arc<Mutex<Vec<String>>>,
}

struct ScriptedInstance {
    label: String,
    result: Option<bool>,
}

impl Conditionlet for Scripted {
    type Instance = ScriptedInstance;

    fn id(&self) -> &str {
        "Scripted"
    }

    fn instance_from(&self, parameters: &Parameters, _registry: &Registry) -> Result<ScriptedInstance> {
        let label = parameters.require("label", &DataType::text())?;
        // result 缺省时模拟运行期故障
        let result = parameters.optional("result", &DataType::boolean())?;
        Ok(ScriptedInstance { label, result })
    }

    fn evaluate(&self, _ctx: &RequestContext, instance: &ScriptedInstance) -> Result<bool> {
        self.log.lock().push(instance.label.clone());
        instance
            .result
            .ok_or_else(|| RuleError::Evaluation(format!("condition '{}' unavailable", instance.label)))
    }
}

/// 执行时总是失败的动作插件
struct Flaky;

impl Actionlet for Flaky {
    type Instance = ();

    fn id(&self) -> &str {
        "Flaky"
    }

    fn instance_from(&self, _parameters: &Parameters, _registry: &Registry) -> Result<()> {
        Ok(())
    }

    fn evaluate(&self, _ctx: &mut RequestContext, _instance: &()) -> Result<bool> {
        Err(RuleError::Evaluation("downstream unavailable".into()))
    }
}

struct Harness {
    evaluator: RuleEvaluator,
    log: Arc<Mutex<Vec<String>>>,
}

fn harness() -> Harness {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::builder()
        .default_data_types()
        .default_comparisons()
        .conditionlet(Scripted {
            log: Arc::clone(&log),
        })
        .conditionlet(rule_engine::conditionlets::RequestParameterConditionlet)
        .actionlet(rule_engine::actionlets::SetResponseHeaderActionlet::new())
        .actionlet(Flaky)
        .build();

    Harness {
        evaluator: RuleEvaluator::new(Arc::new(registry)),
        log,
    }
}

fn scripted(label: &str, operator: LogicalOperator, result: bool) -> Condition {
    Condition::new("Scripted", operator)
        .with_id(label)
        .with_parameter("label", label)
        .with_parameter("result", result.to_string())
}

fn param_x_is(value: &str) -> Condition {
    Condition::new("RequestParameter", LogicalOperator::And)
        .with_parameter("name", "X")
        .with_parameter("comparison", "is")
        .with_parameter("value", value)
}

fn set_header(name: &str, value: &str) -> RuleAction {
    RuleAction::new("SetHeader")
        .with_parameter("name", name)
        .with_parameter("value", value)
}

fn default_registry() -> Arc<Registry> {
    Arc::new(Registry::with_defaults(Arc::new(StaticPersonaDirectory::default())))
}

fn request_with_x(x: &str) -> RequestContext {
    RequestContext::new(Request::new("GET", "/products").with_parameter("X", x))
}

// ==================== 端到端场景 ====================

#[test]
fn test_header_set_when_parameter_matches() {
    let evaluator = RuleEvaluator::new(default_registry());
    let rule = Rule::new("x_equals_5")
        .with_group(ConditionGroup::and().with_condition(param_x_is("5")))
        .with_action(set_header("X-Test", "1"));

    let mut ctx = request_with_x("5");
    let outcome = evaluator.evaluate(&rule, &mut ctx).unwrap();
    assert!(outcome.fired);
    assert_eq!(ctx.response().header("X-Test"), Some("1"));

    let mut ctx = request_with_x("7");
    let outcome = evaluator.evaluate(&rule, &mut ctx).unwrap();
    assert!(!outcome.fired);
    assert!(ctx.response().header("X-Test").is_none());
}

#[test]
fn test_rule_from_json_definition() {
    let registry = default_registry();
    let evaluator = Arc::new(RuleEvaluator::new(registry));
    let store = RuleStore::with_validator(Arc::clone(&evaluator));

    let rule_id = store
        .load_from_json(
            &json!({
                "id": "mobile-vip",
                "name": "移动端 VIP",
                "conditionGroups": [{
                    "id": "g-1",
                    "operator": "AND",
                    "conditions": [
                        {
                            "id": "c-1",
                            "conditionlet": "RequestHeader",
                            "operator": "AND",
                            "parameters": {
                                "header": {"key": "header", "value": "User-Agent"},
                                "comparison": {"key": "comparison", "value": "contains"},
                                "value": {"key": "value", "value": "iPhone"}
                            }
                        },
                        {
                            "id": "c-2",
                            "conditionlet": "RequestAttribute",
                            "operator": "AND",
                            "parameters": {
                                "path": {"key": "path", "value": "user.tier"},
                                "comparison": {"key": "comparison", "value": "oneOf"},
                                "value": {"key": "value", "value": "gold, platinum"}
                            }
                        }
                    ]
                }],
                "actions": [
                    {
                        "id": "a-1",
                        "actionlet": "SetRequestAttribute",
                        "priority": 1,
                        "parameters": {
                            "name": {"key": "name", "value": "discount"},
                            "value": {"key": "value", "value": "15"},
                            "type": {"key": "type", "value": "numeric"}
                        }
                    },
                    {
                        "id": "a-2",
                        "actionlet": "TagVisitor",
                        "parameters": {
                            "tags": {"key": "tags", "value": "mobile,vip"}
                        }
                    }
                ]
            })
            .to_string(),
        )
        .unwrap();

    let request = Request::new("GET", "/")
        .with_header("user-agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)")
        .with_attributes(json!({"user": {"tier": "Gold"}}));
    let mut ctx = RequestContext::new(request).with_visitor(Visitor::new());

    let rule = store.get(&rule_id).unwrap();
    let outcome = evaluator.evaluate(&rule, &mut ctx).unwrap();

    assert!(outcome.fired);
    let order: Vec<_> = outcome.actions.iter().map(|a| a.action_id.as_str()).collect();
    assert_eq!(order, vec!["a-2", "a-1"]);
    assert_eq!(ctx.attribute("discount"), Some(&json!(15.0)));
    assert!(ctx.visitor().unwrap().tags.contains("vip"));
}

// ==================== 条件折叠 ====================

#[test]
fn test_linear_fold_mixed_operators() {
    let h = harness();
    let rule = Rule::new("fold").with_group(
        ConditionGroup::and()
            .with_condition(scripted("A", LogicalOperator::And, true))
            .with_condition(scripted("B", LogicalOperator::And, false))
            .with_condition(scripted("C", LogicalOperator::Or, true)),
    );

    let outcome = h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert!(outcome.fired);
    assert_eq!(*h.log.lock(), vec!["A", "B", "C"]);
}

#[test]
fn test_short_circuit_skips_remaining_conditions() {
    let h = harness();
    let rule = Rule::new("short").with_group(
        ConditionGroup::and()
            .with_condition(scripted("A", LogicalOperator::And, false))
            .with_condition(scripted("B", LogicalOperator::And, true)),
    );

    let outcome = h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert!(!outcome.fired);
    assert_eq!(*h.log.lock(), vec!["A"]);
}

#[test]
fn test_conditions_evaluated_in_priority_order() {
    let h = harness();
    let rule = Rule::new("ordered").with_group(
        ConditionGroup::and()
            .with_condition(scripted("p3", LogicalOperator::And, true).with_priority(3))
            .with_condition(scripted("p1", LogicalOperator::And, true).with_priority(1))
            .with_condition(scripted("p2-first", LogicalOperator::And, true).with_priority(2))
            .with_condition(scripted("p2-second", LogicalOperator::And, true).with_priority(2)),
    );

    h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert_eq!(*h.log.lock(), vec!["p1", "p2-first", "p2-second", "p3"]);

    // 定义本身不会被重新排序
    let conditions = rule.condition_groups[0].conditions.as_ref().unwrap();
    assert_eq!(conditions[0].id, "p3");
}

#[test]
fn test_groups_folded_in_priority_order() {
    let h = harness();
    // 按插入顺序折叠时 OR 组会被跳过，规则不触发
    let rule = Rule::new("group_order")
        .with_group(
            ConditionGroup::or()
                .with_priority(5)
                .with_condition(scripted("late", LogicalOperator::And, true)),
        )
        .with_group(
            ConditionGroup::and()
                .with_priority(1)
                .with_condition(scripted("early", LogicalOperator::And, false)),
        );

    let outcome = h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert!(outcome.fired);
    assert_eq!(*h.log.lock(), vec!["early", "late"]);
}

#[test]
fn test_equal_priority_groups_keep_insertion_order() {
    let h = harness();
    let rule = Rule::new("group_ties")
        .with_group(
            ConditionGroup::and()
                .with_priority(2)
                .with_condition(scripted("x", LogicalOperator::And, true)),
        )
        .with_group(
            ConditionGroup::and()
                .with_priority(2)
                .with_condition(scripted("y", LogicalOperator::And, true)),
        )
        .with_group(
            ConditionGroup::and()
                .with_priority(0)
                .with_condition(scripted("z", LogicalOperator::And, true)),
        );

    let outcome = h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert!(outcome.fired);
    assert_eq!(*h.log.lock(), vec!["z", "x", "y"]);
}

#[test]
fn test_numeric_looking_parameters_compare_exactly() {
    let evaluator = RuleEvaluator::new(default_registry());
    let rule = |value: &str| {
        Rule::new("exact")
            .with_group(ConditionGroup::and().with_condition(param_x_is(value)))
            .with_action(set_header("X-Test", "1"))
    };
    let fired = |value: &str, x: &str| {
        evaluator
            .evaluate(&rule(value), &mut request_with_x(x))
            .unwrap()
            .fired
    };

    assert!(fired("12345678901234567890", "12345678901234567890"));
    assert!(!fired("12345678901234567890", "12345678901234567891"));
    assert!(fired("NaN", "NaN"));
    assert!(fired("Infinity", "Infinity"));
    assert!(fired(" 5", "5.0"));
}

#[test]
fn test_condition_failure_is_isolated() {
    let h = harness();
    let failing = Condition::new("Scripted", LogicalOperator::Or)
        .with_id("broken")
        .with_parameter("label", "broken");

    let rule = Rule::new("recovers")
        .with_group(
            ConditionGroup::and()
                .with_condition(failing)
                .with_condition(scripted("fallback", LogicalOperator::Or, true)),
        )
        .with_action(set_header("X-Recovered", "yes"));

    let mut ctx = RequestContext::default();
    let outcome = h.evaluator.evaluate(&rule, &mut ctx).unwrap();

    // 累积值初始为 true，第一个 OR 条件不会被求值
    assert!(outcome.fired);
    assert_eq!(ctx.response().header("X-Recovered"), Some("yes"));

    let rule = Rule::new("fails_closed").with_group(
        ConditionGroup::and().with_condition(
            Condition::new("Scripted", LogicalOperator::And).with_parameter("label", "broken"),
        ),
    );
    let outcome = h.evaluator.evaluate(&rule, &mut RequestContext::default()).unwrap();
    assert!(!outcome.fired);
    assert!(h.log.lock().contains(&"broken".to_string()));
}

// ==================== 动作生命周期 ====================

#[test]
fn test_action_lifecycle() {
    let registry = default_registry();
    let action = set_header("X-Test", "1").with_id("a-1");
    let mut run = ActionRun::new(&action);
    let mut ctx = RequestContext::default();

    assert!(matches!(run.evaluate(&mut ctx), Err(RuleError::NotValidated(_))));

    run.check_valid(&registry).unwrap();
    run.check_valid(&registry).unwrap();
    assert_eq!(run.state(), ActionState::Validated);

    assert!(run.evaluate(&mut ctx).unwrap());
    assert_eq!(run.state(), ActionState::Executed { success: true });
    assert_eq!(ctx.response().headers().len(), 1);
}

#[test]
fn test_unknown_actionlet_rejected_before_conditions() {
    let h = harness();
    let rule = Rule::new("unknown")
        .with_group(ConditionGroup::and().with_condition(scripted("A", LogicalOperator::And, true)))
        .with_action(RuleAction::new("Teleport"));

    let err = h.evaluator.check_valid(&rule).unwrap_err();
    assert!(matches!(err, RuleError::Configuration(_)));
    assert!(err.is_authoring_error());

    let err = h
        .evaluator
        .evaluate(&rule, &mut RequestContext::default())
        .unwrap_err();
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    assert!(h.log.lock().is_empty());
}

#[test]
fn test_failing_action_does_not_stop_others() {
    let h = harness();
    let rule = Rule::new("mixed")
        .with_action(set_header("X-Before", "1").with_id("before").with_priority(1))
        .with_action(RuleAction::new("Flaky").with_id("flaky").with_priority(2))
        .with_action(set_header("X-After", "1").with_id("after").with_priority(3));

    let mut ctx = RequestContext::default();
    let outcome = h.evaluator.evaluate(&rule, &mut ctx).unwrap();

    assert!(outcome.fired);
    assert!(!outcome.all_actions_succeeded());
    let flaky = outcome.action("flaky").unwrap();
    assert!(!flaky.success);
    assert!(flaky.error.as_deref().unwrap().contains("downstream unavailable"));
    assert_eq!(ctx.response().header("X-Before"), Some("1"));
    assert_eq!(ctx.response().header("X-After"), Some("1"));
}

#[test]
fn test_equal_priority_actions_keep_insertion_order() {
    let h = harness();
    let rule = Rule::new("action_ties")
        .with_action(set_header("X-Order", "first").with_id("first").with_priority(1))
        .with_action(set_header("X-Order", "second").with_id("second").with_priority(1))
        .with_action(set_header("X-Zero", "1").with_id("zero").with_priority(0));

    let mut ctx = RequestContext::default();
    let outcome = h.evaluator.evaluate(&rule, &mut ctx).unwrap();

    let order: Vec<_> = outcome.actions.iter().map(|a| a.action_id.as_str()).collect();
    assert_eq!(order, vec!["zero", "first", "second"]);
    assert_eq!(ctx.response().header("X-Order"), Some("second"));
}

// ==================== 外部协作者 ====================

#[test]
fn test_set_persona_through_directory() {
    let mut directory = MockDirectory::new();
    directory
        .expect_find_persona()
        .with(eq("p-shopper"))
        .times(1)
        .returning(|id| {
            let mut persona = Persona::new(id, "Shopper");
            persona.key_tag = Some("shopper".into());
            Ok(Some(persona))
        });

    let registry = Arc::new(Registry::with_defaults(Arc::new(directory)));
    let evaluator = RuleEvaluator::new(registry);

    let assign = Rule::new("assign")
        .with_priority(1)
        .with_action(RuleAction::new("SetPersona").with_parameter("personaId", "p-shopper"));
    let react = Rule::new("react")
        .with_priority(2)
        .with_group(
            ConditionGroup::and().with_condition(
                Condition::new("VisitorPersona", LogicalOperator::And)
                    .with_parameter("persona", "shopper"),
            ),
        )
        .with_action(set_header("X-Persona", "shopper"));

    let mut ctx = RequestContext::new(Request::new("GET", "/")).with_visitor(Visitor::new());
    let report = evaluator.fire_rules(&[react, assign], &mut ctx);

    assert_eq!(report.fired_count(), 2);
    assert_eq!(ctx.response().header("X-Persona"), Some("shopper"));
}

#[test]
fn test_deferred_group_loaded_once_across_threads() {
    let mut loader = MockLoader::new();
    loader
        .expect_load_conditions()
        .with(eq("g-deferred"))
        .times(1)
        .returning(|_| {
            Ok(vec![
                Condition::new("RequestParameter", LogicalOperator::And)
                    .with_parameter("name", "X")
                    .with_parameter("comparison", "greaterThan")
                    .with_parameter("value", "10"),
            ])
        });

    let evaluator =
        Arc::new(RuleEvaluator::new(default_registry()).with_loader(Arc::new(loader)));
    let rule = Arc::new(
        Rule::new("deferred")
            .with_group(ConditionGroup::deferred("g-deferred", LogicalOperator::And))
            .with_action(set_header("X-Big", "1")),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let evaluator = Arc::clone(&evaluator);
            let rule = Arc::clone(&rule);
            thread::spawn(move || {
                let x = if i % 2 == 0 { "42" } else { "3" };
                let mut ctx = request_with_x(x);
                let outcome = evaluator.evaluate(&rule, &mut ctx).unwrap();
                (i, outcome.fired, ctx.response().header("X-Big").map(str::to_string))
            })
        })
        .collect();

    for handle in handles {
        let (i, fired, header) = handle.join().unwrap();
        assert_eq!(fired, i % 2 == 0);
        assert_eq!(header.is_some(), i % 2 == 0);
    }

    // 共享定义未被修改
    assert!(!rule.condition_groups[0].is_populated());
}

#[test]
fn test_loader_failure_rejects_rule() {
    let mut loader = MockLoader::new();
    loader
        .expect_load_conditions()
        .returning(|_| Err(anyhow::anyhow!("storage offline")));

    let evaluator = RuleEvaluator::new(default_registry()).with_loader(Arc::new(loader));
    let rule = Rule::new("deferred")
        .with_group(ConditionGroup::deferred("g-1", LogicalOperator::And));

    let report = evaluator.fire_rules(&[rule], &mut RequestContext::default());
    assert!(report.outcomes.is_empty());
    assert_eq!(report.failures[0].code, "LOAD_ERROR");
}
