// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::OnceLock;

const FALLBACK_LANG: &str = "en";

// Catálogo: (chave, en, fr, pt)
const MESSAGES: &[(&str, &str, &str, &str)] = &[
    (
        "validation_failed",
        "One or more fields are invalid.",
        "Un ou plusieurs champs sont invalides.",
        "Um ou mais campos são inválidos.",
    ),
    (
        "email_already_exists",
        "This e-mail is already in use.",
        "Cet e-mail est déjà utilisé.",
        "Este e-mail já está em uso.",
    ),
    (
        "unique_violation",
        "A record with these values already exists.",
        "Un enregistrement avec ces valeurs existe déjà.",
        "Já existe um registro com esses valores.",
    ),
    (
        "invalid_credentials",
        "Invalid e-mail or password.",
        "E-mail ou mot de passe invalide.",
        "E-mail ou senha inválidos.",
    ),
    (
        "invalid_token",
        "Missing or invalid authentication token.",
        "Jeton d'authentification absent ou invalide.",
        "Token de autenticação inválido ou ausente.",
    ),
    (
        "account_suspended",
        "This account is suspended.",
        "Ce compte est suspendu.",
        "Esta conta está suspensa.",
    ),
    (
        "permission_denied",
        "You do not have permission to perform this action.",
        "Vous n'avez pas la permission d'effectuer cette action.",
        "Você não tem permissão para realizar esta ação.",
    ),
    (
        "not_found",
        "Resource not found.",
        "Ressource introuvable.",
        "Recurso não encontrado.",
    ),
    (
        "assignment_required",
        "The client must be assigned to a commercial before opening a session.",
        "Le client doit être assigné à un commercial avant d'ouvrir une session.",
        "O cliente precisa ser atribuído a um comercial antes de abrir uma sessão.",
    ),
    (
        "active_session_exists",
        "The client already has an active session.",
        "Le client a déjà une session active.",
        "O cliente já possui uma sessão ativa.",
    ),
    (
        "session_not_active",
        "The session is not active.",
        "La session n'est pas active.",
        "A sessão não está ativa.",
    ),
    (
        "client_has_dependencies",
        "The client has sessions, invoices or payments and cannot be deleted.",
        "Le client a des sessions, factures ou paiements et ne peut pas être supprimé.",
        "O cliente possui sessões, faturas ou pagamentos e não pode ser removido.",
    ),
    (
        "superadmin_protected",
        "The SUPERADMIN role is protected.",
        "Le rôle SUPERADMIN est protégé.",
        "O cargo SUPERADMIN é protegido.",
    ),
    (
        "system_role_protected",
        "System roles cannot be removed.",
        "Les rôles système ne peuvent pas être supprimés.",
        "Cargos de sistema não podem ser removidos.",
    ),
    (
        "payment_exceeds_balance",
        "The payment exceeds the remaining balance.",
        "Le paiement dépasse le montant restant.",
        "O pagamento excede o saldo restante.",
    ),
    (
        "too_many_files",
        "Too many files in a single upload.",
        "Trop de fichiers dans un seul envoi.",
        "Arquivos demais em um único envio.",
    ),
    (
        "upload_mismatch",
        "Each file needs exactly one title.",
        "Chaque fichier doit avoir exactement un titre.",
        "Cada arquivo precisa de exatamente um título.",
    ),
    (
        "payload_too_large",
        "The upload exceeds the maximum allowed size.",
        "L'envoi dépasse la taille maximale autorisée.",
        "O envio excede o tamanho máximo permitido.",
    ),
    (
        "internal_error",
        "An unexpected error occurred.",
        "Une erreur inattendue est survenue.",
        "Ocorreu um erro inesperado.",
    ),
];

/// Mensagens traduzidas por idioma (en, fr, pt). Idioma desconhecido cai no inglês.
#[derive(Debug, Clone)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<&'static str, &'static str>>,
}

impl I18nStore {
    pub fn new() -> Self {
        let mut messages: HashMap<String, HashMap<&'static str, &'static str>> = HashMap::new();
        for &(key, en, fr, pt) in MESSAGES {
            messages.entry("en".into()).or_default().insert(key, en);
            messages.entry("fr".into()).or_default().insert(key, fr);
            messages.entry("pt".into()).or_default().insert(key, pt);
        }
        Self { messages }
    }

    pub fn global() -> &'static I18nStore {
        static STORE: OnceLock<I18nStore> = OnceLock::new();
        STORE.get_or_init(I18nStore::new)
    }

    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .or_else(|| {
                self.messages
                    .get(FALLBACK_LANG)
                    .and_then(|catalog| catalog.get(key))
            })
            .map(|m| m.to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}
