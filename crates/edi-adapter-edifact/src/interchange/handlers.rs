//! Control block handlers for UN/EDIFACT syntax version 4.1

use super::context::{InterchangeContext, MessageMode, MessageScope, Scope, ScopeKind};
use crate::envelopes::{self, MessageIdentifier, component_value, count_value, field_value};
use crate::mapper::MessageMapper;
use crate::report::{GroupSummary, InterchangeSummary, MessageSummary};
use crate::syntax::{self, Encoding, UNA_ADVICE_LENGTH};
use crate::Result;
use edi_schema::Edimap;
use edi_validation::{IssueKind, Severity};
use tracing::{debug, info, warn};

/// Processes one control segment whose code is in the read buffer
pub trait ControlBlockHandler: Send + Sync {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()>;
}

/// Supplies handlers by segment code, plus the envelope model they map
/// control segments with
pub trait ControlBlockHandlerFactory: Send + Sync {
    /// `None` for codes that are not control segments of this standard
    fn handler(&self, segment_code: &str) -> Option<&dyn ControlBlockHandler>;

    fn envelope(&self) -> &Edimap;
}

/// Handlers for UNA, UNB, UNG, UNH, UNT, UNE and UNZ
pub struct UnEdifact41HandlerFactory {
    envelope: Edimap,
}

impl UnEdifact41HandlerFactory {
    pub fn new() -> Result<Self> {
        Ok(Self {
            envelope: envelopes::un_edifact_v41()?,
        })
    }
}

impl ControlBlockHandlerFactory for UnEdifact41HandlerFactory {
    fn handler(&self, segment_code: &str) -> Option<&dyn ControlBlockHandler> {
        match segment_code {
            "UNA" => Some(&UnaHandler),
            "UNB" => Some(&UnbHandler),
            "UNG" => Some(&UngHandler),
            "UNH" => Some(&UnhHandler),
            "UNT" => Some(&UntHandler),
            "UNE" => Some(&UneHandler),
            "UNZ" => Some(&UnzHandler),
            _ => None,
        }
    }

    fn envelope(&self) -> &Edimap {
        &self.envelope
    }
}

fn out_of_place(ctx: &InterchangeContext<'_>, code: &str) -> crate::Error {
    let scope = ctx.scope().map_or("top level", |s| s.name());
    ctx.structure_error(code, format!("Segment {code} is not allowed at {scope}"))
}

/// UNA: service string advice, applied by the following UNB
struct UnaHandler;

impl ControlBlockHandler for UnaHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        if !ctx.scopes.is_empty() || ctx.pending_advice.is_some() {
            return Err(out_of_place(ctx, "UNA"));
        }
        ctx.reader.clear_buffer();
        let advice = ctx.reader.read(UNA_ADVICE_LENGTH)?;
        let delimiters = syntax::delimiters_from_una(&advice)?;
        debug!(advice = %advice, "Service string advice");
        ctx.pending_advice = Some(delimiters);
        Ok(())
    }
}

/// UNB: interchange header
struct UnbHandler;

impl ControlBlockHandler for UnbHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        if !ctx.scopes.is_empty() {
            return Err(out_of_place(ctx, "UNB"));
        }

        let advice = ctx.pending_advice.take();
        if let Some(delimiters) = advice {
            ctx.reader.push_delimiters(delimiters);
        }
        let fields = ctx.read_control_segment("UNB")?;
        let delimiters = *ctx.reader.delimiters();

        let syntax_id = component_value(&fields, 1, 0, &delimiters).unwrap_or_default();
        match syntax::repertoire(&syntax_id) {
            Some(repertoire) => {
                if !repertoire.exact {
                    warn!(syntax_id = %syntax_id, "Character repertoire not supported, decoding as UTF-8");
                    ctx.report(
                        "UNB",
                        Severity::Warning,
                        IssueKind::Syntax,
                        format!("Character repertoire {syntax_id} is decoded as UTF-8"),
                    );
                }
                ctx.reader.set_encoding(repertoire.encoding);
            }
            None => {
                return Err(ctx.structure_error(
                    "UNB",
                    format!("Unknown syntax identifier '{syntax_id}'"),
                ));
            }
        }

        let control_ref = field_value(&fields, 5, &delimiters).unwrap_or_default();
        let index = ctx.interchanges.len() + 1;
        let element_depth = ctx.out.emitter.depth();
        ctx.push_scope(
            "UNB",
            Scope {
                kind: ScopeKind::Interchange,
                element_depth,
                pushed_delimiters: advice.is_some(),
                path: format!("interchange[{index}]"),
            },
        )?;
        info!(control_ref = %control_ref, syntax_id = %syntax_id, "Interchange started");
        ctx.interchanges.push(InterchangeSummary {
            control_ref,
            ..Default::default()
        });

        ctx.open_envelope_element("interchange")?;
        ctx.map_control_segment("UNB", &fields)
    }
}

/// UNG: functional group header
struct UngHandler;

impl ControlBlockHandler for UngHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        let Some(Scope {
            kind: ScopeKind::Interchange,
            path,
            ..
        }) = ctx.scope()
        else {
            return Err(out_of_place(ctx, "UNG"));
        };
        let parent_path = path.clone();

        let fields = ctx.read_control_segment("UNG")?;
        let delimiters = *ctx.reader.delimiters();
        let group_ref = field_value(&fields, 5, &delimiters).unwrap_or_default();

        let index = ctx.current_interchange().map_or(1, |i| i.group_count + 1);
        if let Some(interchange) = ctx.current_interchange() {
            interchange.group_count += 1;
            interchange.groups.push(GroupSummary {
                group_ref: group_ref.clone(),
                ..Default::default()
            });
        }

        let element_depth = ctx.out.emitter.depth();
        ctx.push_scope(
            "UNG",
            Scope {
                kind: ScopeKind::Group { group_ref },
                element_depth,
                pushed_delimiters: false,
                path: format!("{parent_path}/group[{index}]"),
            },
        )?;
        ctx.open_envelope_element("group")?;
        ctx.map_control_segment("UNG", &fields)
    }
}

/// UNH: message header; selects the mapping model for the body
struct UnhHandler;

impl ControlBlockHandler for UnhHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        let parent_path = match ctx.scope() {
            Some(Scope {
                kind: ScopeKind::Interchange | ScopeKind::Group { .. },
                path,
                ..
            }) => path.clone(),
            _ => return Err(out_of_place(ctx, "UNH")),
        };

        let fields = ctx.read_control_segment("UNH")?;
        let delimiters = *ctx.reader.delimiters();
        let message_ref = field_value(&fields, 1, &delimiters).unwrap_or_default();
        let identifier = MessageIdentifier::from_unh(&fields, &delimiters)
            .ok_or_else(|| ctx.structure_error("UNH", "Missing message type identifier"))?;
        let description = identifier.description();

        // Message numbering runs across groups within one interchange
        let index = ctx.current_interchange().map_or(1, |i| i.message_count + 1);
        let first_segment = ctx.reader.segment_number();
        let element_depth = ctx.out.emitter.depth();
        ctx.push_scope(
            "UNH",
            Scope {
                kind: ScopeKind::Message(MessageScope {
                    message_ref,
                    description: description.clone(),
                    first_segment,
                    mode: MessageMode::Skip,
                }),
                element_depth,
                pushed_delimiters: false,
                path: format!("{parent_path}/message[{index}]"),
            },
        )?;

        ctx.open_envelope_element("interchangeMessage")?;
        ctx.map_control_segment("UNH", &fields)?;

        let (mode, pushed) = match ctx.registry.lookup(&description)? {
            Some(model) => {
                debug!(message = %description, model = %model.description(), "Mapping message body");
                let pushed = match model.body_delimiters() {
                    Some(body) => {
                        ctx.reader.push_delimiters(*body);
                        true
                    }
                    None => false,
                };
                let mut mapper = MessageMapper::new(model, ctx.scopes.len(), ctx.config.max_depth);
                mapper.start(&mut ctx.out)?;
                (MessageMode::Mapped(Box::new(mapper)), pushed)
            }
            None if ctx.config.validate => {
                warn!(message = %description, "No mapping model, message skipped");
                ctx.report(
                    "UNH",
                    Severity::Fatal,
                    IssueKind::Lookup,
                    format!("No mapping model registered for message {description}"),
                );
                (MessageMode::Skip, false)
            }
            None => {
                debug!(message = %description, "No mapping model, passing body through");
                ctx.report(
                    "UNH",
                    Severity::Warning,
                    IssueKind::Lookup,
                    format!("No mapping model registered for message {description}; body passed through"),
                );
                (MessageMode::PassThrough, false)
            }
        };

        if let Some(Scope {
            kind: ScopeKind::Message(message),
            pushed_delimiters,
            ..
        }) = ctx.scopes.last_mut()
        {
            message.mode = mode;
            *pushed_delimiters = pushed;
        }
        Ok(())
    }
}

/// UNT: message trailer
struct UntHandler;

impl ControlBlockHandler for UntHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        if !ctx.in_message() {
            return Err(out_of_place(ctx, "UNT"));
        }
        let fields = ctx.read_control_segment("UNT")?;
        let delimiters = *ctx.reader.delimiters();
        let location = ctx.location("UNT");

        let Some(Scope {
            kind: ScopeKind::Message(message),
            ..
        }) = ctx.scopes.last_mut()
        else {
            return Err(location.structure_error("UNT outside of a message"));
        };
        let mapped = match &mut message.mode {
            MessageMode::Mapped(mapper) => {
                mapper.finish(&mut ctx.out, &location)?;
                true
            }
            _ => false,
        };
        let segment_count = ctx.reader.segment_number() + 1 - message.first_segment;
        let message_ref = message.message_ref.clone();
        let description = message.description.clone();

        let declared = count_value(&fields, 1, &delimiters);
        let trailer_ref = field_value(&fields, 2, &delimiters).unwrap_or_default();
        if declared != Some(segment_count) {
            ctx.control_count_issue(
                "UNT",
                format!(
                    "UNT declares {} segments, message {message_ref} has {segment_count}",
                    declared.map_or_else(|| "no".to_string(), |c| c.to_string())
                ),
            )?;
        }
        if trailer_ref != message_ref {
            ctx.control_count_issue(
                "UNT",
                format!("UNT reference '{trailer_ref}' does not match UNH reference '{message_ref}'"),
            )?;
        }

        // The trailer belongs to the message element
        ctx.map_control_segment("UNT", &fields)?;
        ctx.pop_scope()?;
        ctx.record_message(MessageSummary {
            message_ref,
            description,
            declared_segment_count: declared,
            segment_count,
            mapped,
        });
        Ok(())
    }
}

/// UNE: functional group trailer
struct UneHandler;

impl ControlBlockHandler for UneHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        let Some(Scope {
            kind: ScopeKind::Group { group_ref },
            ..
        }) = ctx.scope()
        else {
            return Err(out_of_place(ctx, "UNE"));
        };
        let group_ref = group_ref.clone();

        let fields = ctx.read_control_segment("UNE")?;
        let delimiters = *ctx.reader.delimiters();
        let declared = count_value(&fields, 1, &delimiters);
        let trailer_ref = field_value(&fields, 2, &delimiters).unwrap_or_default();

        let actual = ctx
            .current_interchange()
            .and_then(|i| i.groups.last_mut())
            .map_or(0, |g| {
                g.declared_count = declared;
                g.message_count
            });
        if declared != Some(actual) {
            ctx.control_count_issue(
                "UNE",
                format!(
                    "UNE declares {} messages, group {group_ref} has {actual}",
                    declared.map_or_else(|| "no".to_string(), |c| c.to_string())
                ),
            )?;
        }
        if trailer_ref != group_ref {
            ctx.control_count_issue(
                "UNE",
                format!("UNE reference '{trailer_ref}' does not match UNG reference '{group_ref}'"),
            )?;
        }

        ctx.map_control_segment("UNE", &fields)?;
        ctx.pop_scope()?;
        Ok(())
    }
}

/// UNZ: interchange trailer
struct UnzHandler;

impl ControlBlockHandler for UnzHandler {
    fn process(&self, ctx: &mut InterchangeContext<'_>) -> Result<()> {
        if !matches!(
            ctx.scope().map(|s| &s.kind),
            Some(ScopeKind::Interchange)
        ) {
            return Err(out_of_place(ctx, "UNZ"));
        }

        let fields = ctx.read_control_segment("UNZ")?;
        let delimiters = *ctx.reader.delimiters();
        let declared = count_value(&fields, 1, &delimiters);
        let trailer_ref = field_value(&fields, 2, &delimiters).unwrap_or_default();

        let (actual, control_ref) = ctx
            .current_interchange()
            .map(|i| {
                i.declared_count = declared;
                (i.control_count(), i.control_ref.clone())
            })
            .unwrap_or_default();
        if declared != Some(actual) {
            ctx.control_count_issue(
                "UNZ",
                format!(
                    "UNZ declares {} messages or groups, interchange {control_ref} has {actual}",
                    declared.map_or_else(|| "no".to_string(), |c| c.to_string())
                ),
            )?;
        }
        if trailer_ref != control_ref {
            ctx.control_count_issue(
                "UNZ",
                format!("UNZ reference '{trailer_ref}' does not match UNB reference '{control_ref}'"),
            )?;
        }

        ctx.map_control_segment("UNZ", &fields)?;
        ctx.pop_scope()?;
        ctx.reader.set_encoding(Encoding::default());
        info!(control_ref = %control_ref, "Interchange finished");
        Ok(())
    }
}
