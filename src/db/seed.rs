use crate::domain::models::StaffRole;
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::PgPool;
use uuid::Uuid;

struct SeedStaff<'a> {
    email: &'a str,
    name: &'a str,
    role: StaffRole,
    password: &'a str,
}

struct SeedEmployee<'a> {
    code: &'a str,
    name: &'a str,
    email: &'a str,
    department: &'a str,
    position: &'a str,
}

/// Bootstrap rows for a fresh database. Conflicts are skipped, so password
/// rotations and profile edits survive restarts.
pub async fn seed_all(pool: &PgPool) -> Result<()> {
    seed_staff(pool).await?;
    seed_employees(pool).await?;
    Ok(())
}

async fn seed_staff(pool: &PgPool) -> Result<()> {
    let staff = vec![
        SeedStaff {
            email: "admin@vibemeter.local",
            name: "System Administrator",
            role: StaffRole::Admin,
            password: "vibemeter-admin",
        },
        SeedStaff {
            email: "hr@vibemeter.local",
            name: "People Experience Team",
            role: StaffRole::Hr,
            password: "vibemeter-hr",
        },
    ];

    let argon = Argon2::default();
    for user in staff {
        let salt = SaltString::generate(OsRng);
        let hash = argon
            .hash_password(user.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        sqlx::query(
            r#"
            INSERT INTO staff_users (id, email, name, role, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.email)
        .bind(user.name)
        .bind(user.role)
        .bind(hash)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_employees(pool: &PgPool) -> Result<()> {
    let employees = vec![
        SeedEmployee {
            code: "EMP0001",
            name: "Priya Sharma",
            email: "priya.sharma@vibemeter.local",
            department: "Engineering",
            position: "Software Engineer",
        },
        SeedEmployee {
            code: "EMP0002",
            name: "Daniel Okafor",
            email: "daniel.okafor@vibemeter.local",
            department: "Engineering",
            position: "Site Reliability Engineer",
        },
        SeedEmployee {
            code: "EMP0003",
            name: "Mei-Ling Chen",
            email: "meiling.chen@vibemeter.local",
            department: "Finance",
            position: "Financial Analyst",
        },
        SeedEmployee {
            code: "EMP0004",
            name: "Tomás Herrera",
            email: "tomas.herrera@vibemeter.local",
            department: "Sales",
            position: "Account Executive",
        },
        SeedEmployee {
            code: "EMP0005",
            name: "Agnieszka Nowak",
            email: "agnieszka.nowak@vibemeter.local",
            department: "Operations",
            position: "Office Manager",
        },
    ];

    let argon = Argon2::default();
    for employee in employees {
        // Initial password is the employee code; the change-password flow
        // rotates it on first login.
        let salt = SaltString::generate(OsRng);
        let hash = argon
            .hash_password(employee.code.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        sqlx::query(
            r#"
            INSERT INTO employees
                (id, employee_code, name, email, department, job_title, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (employee_code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee.code)
        .bind(employee.name)
        .bind(employee.email)
        .bind(employee.department)
        .bind(employee.position)
        .bind(hash)
        .execute(pool)
        .await?;
    }
    Ok(())
}
