// Payload codec
//
// The web server speaks a SOAP-shaped dialect: requests are fixed XML
// templates carrying either a SETVALUE operation or a raw SQL statement,
// and responses wrap a line-oriented pseudo-CSV payload in an XML
// envelope. Values are never interpreted here; everything stays a string.

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::Error;
use crate::models::Row;

/// Line prefix whose values are the column names for every later row.
pub const COLUMN_ROW_PREFIX: &str = "Row000001";

/// Line prefixes that carry metadata and no row data.
const METADATA_PREFIXES: [&str; 2] = ["Response", "NextRows"];

const ENVELOPE_OPEN: &str = concat!(
    r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
    r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
    r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    "<soapenv:Body>",
);
const ENVELOPE_CLOSE: &str = "</soapenv:Body></soapenv:Envelope>";

/// Extra flags sent along with a SETVALUE operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetValueOptionals {
    #[default]
    None,
    /// Ask the server to sync its database before acknowledging.
    /// Thermostat channels need this or the new setpoint is not persisted.
    SyncDb,
}

impl SetValueOptionals {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NO-OPTIONALS",
            Self::SyncDb => "SYNCDB",
        }
    }
}

// ── Encoding ────────────────────────────────────────────────────────

/// Build the envelope that sets one attribute (`status_id`) to `value`.
pub fn encode_set_value(
    session_id: &str,
    status_id: &str,
    value: &str,
    optionals: SetValueOptionals,
) -> String {
    format!(
        "{ENVELOPE_OPEN}<service-runonelement xmlns=\"urn:xmethods-dpadws\">\
         <payload>{value}</payload>\
         <hashcode>NO-HASHCODE</hashcode>\
         <optionals>{optionals}</optionals>\
         <callsource>WEB-DOMUSPAD_SOAP</callsource>\
         <sessionid>{session}</sessionid>\
         <waittime>10</waittime>\
         <idobject>{status_id}</idobject>\
         <operation>SETVALUE</operation>\
         </service-runonelement>{ENVELOPE_CLOSE}",
        value = escape(value),
        optionals = optionals.as_str(),
        session = escape(session_id),
        status_id = escape(status_id),
    )
}

/// Build the DML-SQL envelope for a SELECT statement.
pub fn encode_sql(session_id: &str, statement: &str) -> String {
    let statement = escape_statement(statement);
    format!(
        "{ENVELOPE_OPEN}<service-databasesocketoperation xmlns=\"urn:xmethods-dpadws\">\
         <payload>NO-PAYLOAD</payload>\
         <hashcode>NO-HASHCODE</hashcode>\
         <optionals>NO-OPTIONALS</optionals>\
         <callsource>WEB-DOMUSPAD_SOAP</callsource>\
         <sessionid>{session}</sessionid>\
         <waittime>5</waittime>\
         <function>DML-SQL</function>\
         <type>SELECT</type>\
         <statement>{statement}</statement>\
         <statement-len>{len}</statement-len>\
         </service-databasesocketoperation>{ENVELOPE_CLOSE}",
        session = escape(session_id),
        len = statement.chars().count(),
    )
}

/// Collapse line breaks to spaces and turn both quote styles into `&apos;`.
///
/// The server's SQL socket only understands single quotes and chokes on
/// raw newlines inside the statement element. Nothing else is rewritten,
/// and `statement-len` counts the result as sent.
pub fn escape_statement(statement: &str) -> String {
    statement
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace(['"', '\''], "&apos;")
}

// ── Decoding ────────────────────────────────────────────────────────

/// Flattened view of a response envelope.
///
/// Holds the text of every element keyed by local name (namespace prefix
/// dropped). When a name repeats, the first occurrence wins, which is what
/// a `.//name` lookup on the server's envelopes needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseDocument {
    elements: IndexMap<String, String>,
}

impl ResponseDocument {
    /// Text of the first element with this local name.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.elements.get(name).map(String::as_str)
    }

    /// The `<payload>` text, if present.
    pub fn payload(&self) -> Option<&str> {
        self.find("payload")
    }
}

/// Parse the outer XML of a response.
///
/// Failure here is never fatal for the caller; it signals that the session
/// should be re-established before the next request.
pub fn decode_response(xml: &str) -> Result<ResponseDocument, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<(String, String)> = Vec::new();
    let mut elements = IndexMap::new();
    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                saw_element = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push((name, String::new()));
            }
            Ok(Event::Empty(e)) => {
                saw_element = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                elements.entry(name).or_insert_with(String::new);
            }
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = stack.last_mut() {
                    let unescaped = t.unescape().map_err(|e| Error::Payload {
                        message: format!("bad entity in response: {e}"),
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if let Some((name, text)) = stack.pop() {
                    elements.entry(name).or_insert(text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Payload {
                    message: format!(
                        "invalid XML at byte {}: {e}",
                        reader.buffer_position()
                    ),
                });
            }
        }
    }

    if !saw_element {
        return Err(Error::Payload {
            message: "response contains no XML elements".into(),
        });
    }
    if !stack.is_empty() {
        return Err(Error::Payload {
            message: "response truncated before closing tags".into(),
        });
    }

    Ok(ResponseDocument { elements })
}

/// Parse the pseudo-CSV row payload into ordered row mappings.
///
/// Each line is `Prefix: 'v1','v2',...`. The [`COLUMN_ROW_PREFIX`] line
/// carries column names; `Response` and `NextRows` lines are skipped;
/// every other line is a data row zipped positionally with the names.
pub fn decode_rows(payload: &str) -> Result<Vec<Row>, Error> {
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (index, line) in payload.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (prefix, values) = line.split_once(':').ok_or_else(|| Error::Payload {
            message: format!("line {} has no ':' separator", index + 1),
        })?;
        let prefix = prefix.trim();

        if METADATA_PREFIXES.contains(&prefix) {
            continue;
        }
        if prefix == COLUMN_ROW_PREFIX {
            columns = Some(split_values(values));
            continue;
        }

        let names = columns.as_ref().ok_or_else(|| Error::Payload {
            message: format!("row {prefix} arrived before the column names"),
        })?;
        let values = split_values(values);
        if values.len() > names.len() {
            return Err(Error::Payload {
                message: format!(
                    "row {prefix} has {} values for {} columns",
                    values.len(),
                    names.len()
                ),
            });
        }
        rows.push(names.iter().cloned().zip(values).collect());
    }

    Ok(rows)
}

fn split_values(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let inner = raw.strip_prefix('\'').unwrap_or(raw);
    let inner = inner.strip_suffix('\'').unwrap_or(inner);
    inner.split("','").map(str::to_owned).collect()
}
