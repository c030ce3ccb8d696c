//! 请求上下文
//!
//! 每个请求构建一个上下文：请求部分只读，响应、请求级临时属性
//! 和访客为可写槽位，供条件与动作读取或设置。上下文从不跨请求共享。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// 只读请求视图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    method: String,
    path: String,
    /// 头名称统一存为小写
    #[serde(deserialize_with = "lowercase_keys")]
    headers: HashMap<String, String>,
    parameters: HashMap<String, String>,
    attributes: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求头（名称大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// 获取属性值（支持点号分隔的路径，如 "user.profile.age" 或 "items.0.name"）
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        let mut current = &self.attributes;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }
}

fn lowercase_keys<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect())
}

/// 可写响应视图
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    status: Option<u16>,
    headers: Vec<(String, String)>,
}

impl Response {
    /// 设置响应头；同名（大小写不敏感）头会被替换
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

/// 用户画像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key_tag: Option<String>,
}

impl Persona {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            key_tag: None,
        }
    }
}

/// 当前访客
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Visitor {
    pub id: Uuid,
    pub persona: Option<Persona>,
    pub tags: BTreeSet<String>,
}

impl Visitor {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ..Default::default()
        }
    }

    /// 添加标签，返回新增的标签数量
    pub fn add_tags<I, S>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for tag in tags {
            if self.tags.insert(tag.into()) {
                added += 1;
            }
        }
        added
    }
}

/// 请求上下文
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request: Request,
    response: Response,
    /// 请求级临时属性，由动作写入
    scratch: HashMap<String, Value>,
    visitor: Option<Visitor>,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    /// 附带一个新访客
    pub fn with_visitor(mut self, visitor: Visitor) -> Self {
        self.visitor = Some(visitor);
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn visitor(&self) -> Option<&Visitor> {
        self.visitor.as_ref()
    }

    pub fn visitor_mut(&mut self) -> Option<&mut Visitor> {
        self.visitor.as_mut()
    }

    pub fn set_visitor(&mut self, visitor: Option<Visitor>) {
        self.visitor = visitor;
    }

    /// 读取请求级属性：先查临时属性，再查请求属性文档
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        self.scratch
            .get(path)
            .or_else(|| self.request.attribute(path))
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.scratch.insert(name.into(), value);
    }

    pub fn scratch_attributes(&self) -> &HashMap<String, Value> {
        &self.scratch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_attribute_paths() {
        let request = Request::new("GET", "/index").with_attributes(json!({
            "user": {"id": "user-123", "is_vip": true},
            "cart": {"items": [{"sku": "A-1"}, {"sku": "B-2"}]}
        }));

        assert_eq!(request.attribute("user.id"), Some(&json!("user-123")));
        assert_eq!(request.attribute("cart.items.1.sku"), Some(&json!("B-2")));
        assert_eq!(request.attribute("cart.items.9.sku"), None);
        assert_eq!(request.attribute("missing"), None);
    }

    #[test]
    fn test_deserialized_headers_lowercased() {
        let request: Request = serde_json::from_value(json!({
            "method": "GET",
            "headers": {"User-Agent": "curl/8.0"},
            "parameters": {"X": "5"}
        }))
        .unwrap();

        assert_eq!(request.header("user-agent"), Some("curl/8.0"));
        assert_eq!(request.parameter("X"), Some("5"));
        assert_eq!(request.path(), "");
    }

    #[test]
    fn test_header_case_insensitive() {
        let request = Request::new("GET", "/").with_header("User-Agent", "curl/8.0");
        assert_eq!(request.header("user-agent"), Some("curl/8.0"));
        assert_eq!(request.header("USER-AGENT"), Some("curl/8.0"));
    }

    #[test]
    fn test_response_header_replaced() {
        let mut response = Response::default();
        response.set_header("X-Test", "1");
        response.set_header("x-test", "2");

        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header("X-TEST"), Some("2"));
    }

    #[test]
    fn test_scratch_attribute_shadows_request() {
        let request = Request::new("GET", "/").with_attributes(json!({"segment": "a"}));
        let mut ctx = RequestContext::new(request);
        assert_eq!(ctx.attribute("segment"), Some(&json!("a")));

        ctx.set_attribute("segment", json!("b"));
        assert_eq!(ctx.attribute("segment"), Some(&json!("b")));
        assert_eq!(ctx.request().attribute("segment"), Some(&json!("a")));
    }

    #[test]
    fn test_visitor_tags_are_a_set() {
        let mut visitor = Visitor::new();
        assert_eq!(visitor.add_tags(["sports", "news"]), 2);
        assert_eq!(visitor.add_tags(["news", "travel"]), 1);
        assert_eq!(visitor.tags.len(), 3);
    }
}
