// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RbacRepository, UserRepository},
    models::auth::{AuthResponse, Claims, NewUser, User, SUPERADMIN_ROLE},
};

/// Validade dos tokens de acesso.
const ACCESS_TOKEN_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    rbac_repo: Arc<dyn RbacRepository>,
    jwt_secret: Arc<str>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        rbac_repo: Arc<dyn RbacRepository>,
        jwt_secret: &str,
    ) -> Self {
        Self {
            user_repo,
            rbac_repo,
            jwt_secret: Arc::from(jwt_secret),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Custo do bcrypt (os testes usam o mínimo).
    #[cfg(test)]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }
        if user.is_suspended {
            tracing::warn!(user_id = %user.id, "Login recusado: conta suspensa");
            return Err(AppError::AccountSuspended);
        }

        let token = self.create_token(user.id)?;
        tracing::info!(user_id = %user.id, "Login efetuado");
        Ok(AuthResponse { token, user })
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    /// Decodifica o token e recarrega o usuário (suspensão vale imediatamente).
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if user.is_suspended {
            return Err(AppError::AccountSuspended);
        }
        Ok(user)
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(ACCESS_TOKEN_DAYS);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }

    /// Cria o primeiro SUPERADMIN quando a tabela de usuários está vazia.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        if self.user_repo.count().await? > 0 {
            return Ok(None);
        }

        let role = self
            .rbac_repo
            .find_role_by_name(SUPERADMIN_ROLE)
            .await?
            .ok_or(AppError::NotFound("role"))?;

        let password_hash = self.hash_password(password).await?;
        let user = self
            .user_repo
            .create(NewUser {
                first_name: "Super".to_string(),
                last_name: "Admin".to_string(),
                email: email.trim().to_lowercase(),
                password_hash,
                role_id: role.id,
                service: None,
            })
            .await?;

        tracing::info!(email = %user.email, "Administrador inicial criado");
        Ok(Some(user))
    }
}
