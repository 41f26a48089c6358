use lazy_static::lazy_static;
use serde_json::{json, Value};

use crate::web::models::{ChatMessage, DatosMoto, Role};

/// Name of the structured-output function advertised to the model. The
/// extractor only trusts tool calls carrying this exact name.
pub const TOOL_NAME: &str = "emitir_tasacion";

/// Dealer trade-in appraisal policy. Spanish on purpose: the service targets
/// the Spanish second-hand market and the model answers in kind.
pub const SYSTEM_PROMPT: &str = r#"Rol y Objetivo:
Eres un tasador de motocicletas profesional que trabaja para una red de concesionarios multimarca en España.
Calculas el valor de compra (trade-in) para un concesionario, no el precio entre particulares.

Instrucciones de tasación:
1) Normaliza marca, modelo, versión, año y kms.
2) Estima un PVP de reventa medio en España (orientativo).
3) Aplica ajustes por kms y antigüedad.
4) Calcula coste de reacondicionamiento (revisión, consumibles, neumáticos si procede).
5) Aplica margen concesionario entre 20% y 35% según rotación/demanda/estado.
6) Devuelve un precio de compra estimado para el concesionario.
   La oferta debe cumplir: oferta_compra < pvp_estimado, y
   oferta_compra = max(0, pvp_estimado + ajuste_km + ajuste_antiguedad - coste_reacond - margen_concesionario_eur).

Formato de salida:
- Primero, texto claro con:
  - Resumen (marca, modelo, versión, año, kms)
  - Análisis breve del mercado
  - Desglose: PVP estimado, reacondicionamiento, margen
  - Oferta de compra final (EUR)
  - Nota: oferta sujeta a inspección física y documentación
- Después, llama a la función emitir_tasacion con la tasación estructurada.
Asegúrate de que todos los importes estén en número (EUR)."#;

lazy_static! {
    static ref TOOLS: Value = json!([{
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Entrega la tasación estructurada de la motocicleta.",
            "parameters": {
                "type": "object",
                "properties": {
                    "resumen": {
                        "type": "object",
                        "properties": {
                            "marca": {"type": "string"},
                            "modelo": {"type": "string"},
                            "version": {"type": "string"},
                            "ano": {"type": "number"},
                            "kms": {"type": "number"}
                        },
                        "required": ["marca", "modelo", "version", "ano", "kms"]
                    },
                    "estimaciones": {
                        "type": "object",
                        "properties": {
                            "pvp_estimado": {"type": "number"},
                            "ajuste_km": {"type": "number"},
                            "ajuste_antiguedad": {"type": "number"},
                            "coste_reacond": {"type": "number"},
                            "margen_concesionario_pct": {"type": "number"},
                            "margen_concesionario_eur": {"type": "number"}
                        },
                        "required": ["pvp_estimado", "ajuste_km", "ajuste_antiguedad",
                                     "coste_reacond", "margen_concesionario_pct",
                                     "margen_concesionario_eur"]
                    },
                    "oferta_compra": {"type": "number"},
                    "supuestos": {
                        "type": "object",
                        "properties": {
                            "estado": {"type": "string"},
                            "extras": {"type": "string"},
                            "provincia": {"type": "string"}
                        },
                        "required": ["estado", "extras", "provincia"]
                    },
                    "notas": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["resumen", "estimaciones", "oferta_compra", "supuestos", "notas"]
            }
        }
    }]);
    static ref TOOL_CHOICE: Value = json!({
        "type": "function",
        "function": {"name": TOOL_NAME}
    });
}

pub fn tools() -> &'static Value {
    &TOOLS
}

pub fn tool_choice() -> &'static Value {
    &TOOL_CHOICE
}

/// Assemble the outbound conversation. A non-empty `chat_history` is replayed
/// verbatim after the system prompt; otherwise a single user message is built
/// from the form fields. Absent fields render as empty labels.
pub fn build_messages(datos: &DatosMoto, chat_history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage {
        role: Role::System,
        content: SYSTEM_PROMPT.to_string(),
    }];

    if chat_history.is_empty() {
        messages.push(ChatMessage {
            role: Role::User,
            content: user_message(datos),
        });
    } else {
        messages.extend_from_slice(chat_history);
    }

    messages
}

fn user_message(d: &DatosMoto) -> String {
    let ano = d.ano.map(|v| v.to_string()).unwrap_or_default();
    let kms = d.kms.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "Tasación solicitada:\n\
         - Marca: {}\n\
         - Modelo: {}\n\
         - Versión: {}\n\
         - Año: {}\n\
         - Kilómetros: {}\n\
         - Estado: {}\n\
         - Extras: {}\n\
         - Provincia: {}\n\n\
         Redacta primero el análisis en texto y después llama a la función {} con el desglose estructurado.",
        d.marca, d.modelo, d.version, ano, kms, d.estado, d.extras, d.provincia, TOOL_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_always_first() {
        let messages = build_messages(&DatosMoto::default(), &[]);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
    }

    #[test]
    fn user_message_labels_all_fields_in_order() {
        let datos = DatosMoto {
            marca: "Honda".into(),
            modelo: "PCX125".into(),
            version: "Base".into(),
            ano: Some(2019),
            kms: Some(18000),
            ..Default::default()
        };
        let messages = build_messages(&datos, &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);

        let body = &messages[1].content;
        let labels = [
            "- Marca: Honda",
            "- Modelo: PCX125",
            "- Versión: Base",
            "- Año: 2019",
            "- Kilómetros: 18000",
            "- Estado: ",
        ];
        let mut last = 0;
        for label in labels {
            let pos = body[last..].find(label).unwrap_or_else(|| {
                panic!("label {:?} missing or out of order in {:?}", label, body)
            });
            last += pos;
        }
    }

    #[test]
    fn absent_fields_render_empty() {
        let messages = build_messages(&DatosMoto::default(), &[]);
        let body = &messages[1].content;
        assert!(body.contains("- Marca: \n"));
        assert!(body.contains("- Año: \n"));
        assert!(body.contains("- Provincia: \n"));
    }

    #[test]
    fn chat_history_replaces_user_message() {
        let datos = DatosMoto {
            marca: "Yamaha".into(),
            ..Default::default()
        };
        let history = vec![
            ChatMessage {
                role: Role::User,
                content: "primera pregunta".into(),
            },
            ChatMessage {
                role: Role::Assistant,
                content: "primera respuesta".into(),
            },
            ChatMessage {
                role: Role::User,
                content: "¿y con 30000 kms?".into(),
            },
        ];
        let messages = build_messages(&datos, &history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "primera pregunta");
        assert_eq!(messages[3].content, "¿y con 30000 kms?");
        // The form fields are ignored when a history is supplied.
        assert!(!messages.iter().any(|m| m.content.contains("Yamaha")));
    }

    #[test]
    fn tool_choice_pins_the_function() {
        assert_eq!(tool_choice()["function"]["name"], TOOL_NAME);
        assert_eq!(tools()[0]["function"]["name"], TOOL_NAME);
    }
}
