//! Request envelopes.
//!
//! Every request is a single `<wc-request:request>` root holding, in order,
//! an optional `<auth>`, the `<header>` and the `<info>`. For signed requests:
//!
//! - `<info>` is encoded once ([`Info`]) and its SHA-1 digest, base64, is
//!   placed in `<info-hash>` inside the header;
//! - the finished `<header>` (info-hash included) is HMAC-SHA1-signed with
//!   the session secret and the base64 tag goes in `<auth>`.
//!
//! No whitespace is emitted between elements: the bytes that are digested
//! and signed are exactly the bytes that are sent.

use hvgate_types::{Person, RecordType};

use crate::crypto::{b64_hmac_sha1, b64_sha1};
use crate::error::Result;
use crate::observation::DataXml;
use crate::xml::{escape, push_element};

/// Path of the platform endpoint on the service host.
pub const PLATFORM_PATH: &str = "/platform/wildcat.ashx";

/// Opening tag of every request.
pub const REQUEST_OPEN: &str = r#"<wc-request:request xmlns:wc-request="urn:com.microsoft.wc.request">"#;

/// Closing tag of every request.
pub const REQUEST_CLOSE: &str = "</wc-request:request>";

/// Value of `<language>`.
pub const LANGUAGE: &str = "en";
/// Value of `<country>`.
pub const COUNTRY: &str = "US";
/// Value of `<msg-ttl>` in seconds.
pub const MSG_TTL_SECS: u32 = 36000;
/// Value of `<version>`.
pub const VERSION: &str = "0.0.0.1";
/// Algorithm name for header and credential MACs.
pub const HMAC_ALGORITHM: &str = "HMACSHA1";
/// Algorithm name for the info digest.
pub const HASH_ALGORITHM: &str = "SHA1";

/// Platform methods used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Create a new application instance from the master application id.
    NewApplicationCreationInfo,
    /// Exchange application credentials for a session.
    CreateAuthenticatedSessionToken,
    /// List persons the session may act for.
    GetAuthorizedPeople,
    /// Read records.
    GetThings,
    /// Write records.
    PutThings,
}

impl Method {
    /// Wire name, as written in `<method>`.
    pub fn name(&self) -> &'static str {
        match self {
            Method::NewApplicationCreationInfo => "NewApplicationCreationInfo",
            Method::CreateAuthenticatedSessionToken => "CreateAuthenticatedSessionToken",
            Method::GetAuthorizedPeople => "GetAuthorizedPeople",
            Method::GetThings => "GetThings",
            Method::PutThings => "PutThings",
        }
    }

    /// Value of `<method-version>`.
    pub fn version(&self) -> u32 {
        match self {
            Method::NewApplicationCreationInfo => 1,
            Method::CreateAuthenticatedSessionToken => 2,
            Method::GetAuthorizedPeople => 1,
            Method::GetThings => 3,
            Method::PutThings => 2,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Content of an `<info>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoBody {
    /// `<info/>`.
    Empty,
    /// Query all records of one type.
    GetThings {
        /// Record type to read.
        record_type: RecordType,
    },
    /// Write one record.
    PutThings {
        /// Record type to write.
        record_type: RecordType,
        /// Record body.
        data_xml: DataXml,
    },
}

/// An `<info>` element with its canonical encoding computed once.
///
/// The same bytes feed the info-hash and the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    body: InfoBody,
    encoded: String,
}

impl Info {
    /// Encode an info body.
    pub fn new(body: InfoBody) -> Self {
        let encoded = match &body {
            InfoBody::Empty => "<info/>".to_string(),
            InfoBody::GetThings { record_type } => {
                let mut out = String::from("<info><group><filter>");
                push_element(&mut out, "type-id", &record_type.to_string());
                out.push_str("</filter><format><section>core</section><xml/></format></group></info>");
                out
            }
            InfoBody::PutThings {
                record_type,
                data_xml,
            } => {
                let mut out = String::from("<info><thing>");
                push_element(&mut out, "type-id", &record_type.to_string());
                push_element(&mut out, "data-xml", data_xml.as_str());
                out.push_str("</thing></info>");
                out
            }
        };
        Self { body, encoded }
    }

    /// `<info/>`.
    pub fn empty() -> Self {
        Self::new(InfoBody::Empty)
    }

    /// Info for a GetThings query.
    pub fn get_things(record_type: RecordType) -> Self {
        Self::new(InfoBody::GetThings { record_type })
    }

    /// Info for a PutThings write.
    pub fn put_things(record_type: RecordType, data_xml: DataXml) -> Self {
        Self::new(InfoBody::PutThings {
            record_type,
            data_xml,
        })
    }

    /// The structured content.
    pub fn body(&self) -> &InfoBody {
        &self.body
    }

    /// The encoded element.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Base64 SHA-1 of the encoded element.
    pub fn hash(&self) -> String {
        b64_sha1(self.encoded.as_bytes())
    }
}

/// Credentials used to sign one request.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    /// Session bearer token.
    pub auth_token: &'a str,
    /// Session HMAC key.
    pub session_secret: &'a [u8],
    /// Person the request acts for, if any.
    pub person: Option<&'a Person>,
}

/// Build a signed request.
///
/// `msg_time` must be fresh for every call, retries included.
pub fn signed(
    method: Method,
    ctx: &SigningContext<'_>,
    msg_time: &str,
    info: &Info,
) -> Result<String> {
    let mut header = String::from("<header>");
    push_element(&mut header, "method", method.name());
    push_element(&mut header, "method-version", &method.version().to_string());
    if let Some(person) = ctx.person {
        push_element(&mut header, "record-id", &escape(&person.record_id));
    }
    header.push_str("<auth-session>");
    push_element(&mut header, "auth-token", &escape(ctx.auth_token));
    if let Some(person) = ctx.person {
        header.push_str("<offline-person-info>");
        push_element(&mut header, "offline-person-id", &escape(&person.person_id));
        header.push_str("</offline-person-info>");
    }
    header.push_str("</auth-session>");
    push_common_fields(&mut header, msg_time);
    header.push_str(r#"<info-hash><hash-data algName=""#);
    header.push_str(HASH_ALGORITHM);
    header.push_str(r#"">"#);
    header.push_str(&info.hash());
    header.push_str("</hash-data></info-hash></header>");

    let header_hmac = b64_hmac_sha1(ctx.session_secret, header.as_bytes())?;

    let mut request = String::with_capacity(
        REQUEST_OPEN.len() + header.len() + info.as_str().len() + REQUEST_CLOSE.len() + 96,
    );
    request.push_str(REQUEST_OPEN);
    request.push_str(r#"<auth><hmac-data algName=""#);
    request.push_str(HMAC_ALGORITHM);
    request.push_str(r#"">"#);
    request.push_str(&header_hmac);
    request.push_str("</hmac-data></auth>");
    request.push_str(&header);
    request.push_str(info.as_str());
    request.push_str(REQUEST_CLOSE);
    Ok(request)
}

/// Build a request identified by application id only (no `<auth>`, no info-hash).
pub fn unauthenticated(method: Method, app_id: &str, msg_time: &str, info: &str) -> String {
    let mut request = String::from(REQUEST_OPEN);
    request.push_str("<header>");
    push_element(&mut request, "method", method.name());
    push_element(&mut request, "method-version", &method.version().to_string());
    push_element(&mut request, "app-id", &escape(app_id));
    push_common_fields(&mut request, msg_time);
    request.push_str("</header>");
    request.push_str(info);
    request.push_str(REQUEST_CLOSE);
    request
}

/// Build the CreateAuthenticatedSessionToken request.
///
/// The `<content>` block is signed with the application shared secret and
/// the tag travels next to it in `<hmacSig>`.
pub fn session_token_request(
    app_id: &str,
    app_secret: &[u8],
    signing_time: &str,
    msg_time: &str,
) -> Result<String> {
    let escaped_app_id = escape(app_id);

    let mut content = String::from("<content>");
    push_element(&mut content, "app-id", &escaped_app_id);
    push_element(&mut content, "hmac", HMAC_ALGORITHM);
    push_element(&mut content, "signing-time", signing_time);
    content.push_str("</content>");

    let signature = b64_hmac_sha1(app_secret, content.as_bytes())?;

    let mut info = String::from("<info><auth-info>");
    push_element(&mut info, "app-id", &escaped_app_id);
    info.push_str("<credential><appserver2>");
    info.push_str(r#"<hmacSig algName=""#);
    info.push_str(HMAC_ALGORITHM);
    info.push_str(r#"">"#);
    info.push_str(&signature);
    info.push_str("</hmacSig>");
    info.push_str(&content);
    info.push_str("</appserver2></credential></auth-info></info>");

    Ok(unauthenticated(
        Method::CreateAuthenticatedSessionToken,
        app_id,
        msg_time,
        &info,
    ))
}

/// Build the NewApplicationCreationInfo request.
pub fn app_creation_request(master_app_id: &str, msg_time: &str) -> String {
    unauthenticated(
        Method::NewApplicationCreationInfo,
        master_app_id,
        msg_time,
        Info::empty().as_str(),
    )
}

fn push_common_fields(out: &mut String, msg_time: &str) {
    push_element(out, "language", LANGUAGE);
    push_element(out, "country", COUNTRY);
    push_element(out, "msg-time", msg_time);
    push_element(out, "msg-ttl", &MSG_TTL_SECS.to_string());
    push_element(out, "version", VERSION);
}

/// Text between the first `<tag` and its matching `</tag>`, tags included.
///
/// Used to recover the exact signed byte ranges of a built request.
pub fn element_bytes<'a>(request: &'a str, tag: &str) -> Option<&'a str> {
    let open_plain = format!("<{}>", tag);
    let open_empty = format!("<{}/>", tag);
    let open_attr = format!("<{} ", tag);
    let close = format!("</{}>", tag);

    let start = [&open_plain, &open_empty, &open_attr]
        .iter()
        .filter_map(|pattern| request.find(pattern.as_str()))
        .min()?;
    if request[start..].starts_with(&open_empty) {
        return Some(&request[start..start + open_empty.len()]);
    }
    let end = request[start..].find(&close)? + start + close.len();
    Some(&request[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::b64_hmac_sha1;
    use crate::xml::Element;
    use hvgate_types::record_types;

    const MSG_TIME: &str = "2024-01-02T03:04:05.000006Z";

    fn person() -> Person {
        Person::new("P1", "R1", "Alice")
    }

    #[test]
    fn test_signed_layout_order() {
        let person = person();
        let ctx = SigningContext {
            auth_token: "AUTH1",
            session_secret: b"SS1",
            person: Some(&person),
        };
        let request = signed(Method::GetThings, &ctx, MSG_TIME, &Info::get_things(record_types::WEIGHT)).unwrap();

        assert!(request.starts_with(REQUEST_OPEN));
        assert!(request.ends_with(REQUEST_CLOSE));
        let auth = request.find("<auth>").unwrap();
        let header = request.find("<header>").unwrap();
        let info = request.find("<info>").unwrap();
        assert!(auth < header && header < info);
        assert!(!request.contains('\n'));
        assert!(!request.contains("> <"));
    }

    #[test]
    fn test_signed_header_fields() {
        let person = person();
        let ctx = SigningContext {
            auth_token: "AUTH1",
            session_secret: b"SS1",
            person: Some(&person),
        };
        let request = signed(Method::PutThings, &ctx, MSG_TIME, &Info::empty()).unwrap();
        let root = Element::parse(&request).unwrap();
        let header = root.find("header").unwrap();

        assert_eq!(header.find_text("method"), Some("PutThings"));
        assert_eq!(header.find_text("method-version"), Some("2"));
        assert_eq!(header.find_text("record-id"), Some("R1"));
        assert_eq!(header.find_text("auth-token"), Some("AUTH1"));
        assert_eq!(header.find_text("offline-person-id"), Some("P1"));
        assert_eq!(header.find_text("language"), Some("en"));
        assert_eq!(header.find_text("country"), Some("US"));
        assert_eq!(header.find_text("msg-time"), Some(MSG_TIME));
        assert_eq!(header.find_text("msg-ttl"), Some("36000"));
        assert_eq!(header.find_text("version"), Some("0.0.0.1"));
        assert_eq!(
            header.find("hash-data").and_then(|h| h.attr("algName")),
            Some("SHA1")
        );
        assert_eq!(
            root.find("hmac-data").and_then(|h| h.attr("algName")),
            Some("HMACSHA1")
        );
    }

    #[test]
    fn test_signed_without_person_omits_record_fields() {
        let ctx = SigningContext {
            auth_token: "AUTH1",
            session_secret: b"SS1",
            person: None,
        };
        let request = signed(Method::GetAuthorizedPeople, &ctx, MSG_TIME, &Info::empty()).unwrap();
        assert!(!request.contains("<record-id>"));
        assert!(!request.contains("<offline-person-info>"));
        assert!(request.contains("<info/>"));
    }

    #[test]
    fn test_info_hash_and_header_hmac_bind() {
        let person = person();
        let ctx = SigningContext {
            auth_token: "AUTH1",
            session_secret: b"SS1",
            person: Some(&person),
        };
        let data = DataXml::new("<heart-rate><value>72</value></heart-rate>").unwrap();
        let request = signed(
            Method::PutThings,
            &ctx,
            MSG_TIME,
            &Info::put_things(record_types::HEART_RATE, data),
        )
        .unwrap();

        let info = element_bytes(&request, "info").unwrap();
        let header = element_bytes(&request, "header").unwrap();
        let root = Element::parse(&request).unwrap();

        assert_eq!(root.find_text("hash-data"), Some(b64_sha1(info.as_bytes()).as_str()));
        assert_eq!(
            root.find_text("hmac-data"),
            Some(b64_hmac_sha1(b"SS1", header.as_bytes()).unwrap().as_str())
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let person = Person::new("P<1>", "R&1", "Alice");
        let ctx = SigningContext {
            auth_token: "a\"b",
            session_secret: b"SS1",
            person: Some(&person),
        };
        let request = signed(Method::GetThings, &ctx, MSG_TIME, &Info::empty()).unwrap();
        let root = Element::parse(&request).unwrap();
        assert_eq!(root.find_text("record-id"), Some("R&1"));
        assert_eq!(root.find_text("offline-person-id"), Some("P<1>"));
        assert_eq!(root.find_text("auth-token"), Some("a\"b"));
    }

    #[test]
    fn test_info_encodings() {
        assert_eq!(Info::empty().as_str(), "<info/>");

        let get = Info::get_things(record_types::HEART_RATE);
        assert_eq!(
            get.as_str(),
            "<info><group><filter><type-id>b81eb4a6-6eac-4292-ae93-3872d6870994</type-id></filter>\
             <format><section>core</section><xml/></format></group></info>"
        );

        let data = DataXml::new("<weight/>").unwrap();
        let put = Info::put_things(record_types::WEIGHT, data.clone());
        assert_eq!(
            put.as_str(),
            "<info><thing><type-id>3d34d87e-7fc1-4153-800f-f56592cb0d17</type-id>\
             <data-xml><weight/></data-xml></thing></info>"
        );
        assert_eq!(
            put.body(),
            &InfoBody::PutThings {
                record_type: record_types::WEIGHT,
                data_xml: data
            }
        );
    }

    #[test]
    fn test_session_token_request_signs_content() {
        let request = session_token_request("APP1", b"SEC1", MSG_TIME, MSG_TIME).unwrap();
        let root = Element::parse(&request).unwrap();

        assert_eq!(root.find_text("method"), Some("CreateAuthenticatedSessionToken"));
        assert_eq!(root.find("header").and_then(|h| h.find_text("app-id")), Some("APP1"));
        assert!(root.find("auth").is_none());
        assert!(root.find("info-hash").is_none());

        let content = element_bytes(&request, "content").unwrap();
        assert_eq!(
            content,
            "<content><app-id>APP1</app-id><hmac>HMACSHA1</hmac>\
             <signing-time>2024-01-02T03:04:05.000006Z</signing-time></content>"
        );
        assert_eq!(
            root.find_text("hmacSig"),
            Some(b64_hmac_sha1(b"SEC1", content.as_bytes()).unwrap().as_str())
        );
    }

    #[test]
    fn test_app_creation_request() {
        let request = app_creation_request("MASTER", MSG_TIME);
        assert_eq!(
            request,
            "<wc-request:request xmlns:wc-request=\"urn:com.microsoft.wc.request\"><header>\
             <method>NewApplicationCreationInfo</method><method-version>1</method-version>\
             <app-id>MASTER</app-id><language>en</language><country>US</country>\
             <msg-time>2024-01-02T03:04:05.000006Z</msg-time><msg-ttl>36000</msg-ttl>\
             <version>0.0.0.1</version></header><info/></wc-request:request>"
        );
    }

    #[test]
    fn test_element_bytes() {
        let doc = r#"<r><a x="1"><b/></a><c/></r>"#;
        assert_eq!(element_bytes(doc, "a"), Some(r#"<a x="1"><b/></a>"#));
        assert_eq!(element_bytes(doc, "c"), Some("<c/>"));
        assert_eq!(element_bytes(doc, "d"), None);
    }
}
